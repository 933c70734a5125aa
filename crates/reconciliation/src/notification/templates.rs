//! Customer email templates.

use domain::{NotificationKind, PaymentSession, PaymentTarget};

use super::EmailMessage;

/// Renders the email for a payment outcome.
pub fn payment_outcome(session: &PaymentSession, kind: NotificationKind) -> EmailMessage {
    let customer = session.customer();
    let reference = session.transaction_ref();
    let what = match session.target() {
        PaymentTarget::Order(_) => "order",
        PaymentTarget::Booking(_) => "booking",
    };
    let amount = format!("{} {}", session.currency(), session.amount());

    let (subject, headline, body) = match kind {
        NotificationKind::PaymentSuccess => (
            format!("Payment received for your {what}"),
            "Thank you for your payment".to_string(),
            format!(
                "We received your payment of {amount} for {what} {}. \
                 We will let you know as soon as it moves forward.",
                session.target().id()
            ),
        ),
        NotificationKind::PaymentFailure => (
            format!("Your {what} payment did not go through"),
            "Payment unsuccessful".to_string(),
            format!(
                "Your payment of {amount} for {what} {} could not be completed. \
                 No money was taken. You can place a new {what} at any time.",
                session.target().id()
            ),
        ),
    };

    let text = format!(
        "Hi {name},\n\n{body}\n\nPayment reference: {reference}\n",
        name = customer.name
    );
    let html = format!(
        "<h1>{headline}</h1>\
         <p>Hi {name},</p>\
         <p>{body}</p>\
         <p>Payment reference: <code>{reference}</code></p>",
        headline = escape(&headline),
        name = escape(&customer.name),
        body = escape(&body),
        reference = escape(reference.as_str()),
    );

    EmailMessage {
        to: customer.email.clone(),
        subject,
        html,
        text,
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{CorrelationRef, EntityId};
    use domain::{Currency, Customer, Money};

    fn session(name: &str) -> PaymentSession {
        PaymentSession::new(
            CorrelationRef::parse("ORD-77").unwrap(),
            PaymentTarget::Booking(EntityId::new()),
            Money::from_cents(150_050),
            Currency::parse("NGN").unwrap(),
            Customer::new("ada@example.com", name),
            Utc::now(),
        )
    }

    #[test]
    fn test_success_email() {
        let message = payment_outcome(&session("Ada"), NotificationKind::PaymentSuccess);
        assert_eq!(message.to, "ada@example.com");
        assert_eq!(message.subject, "Payment received for your booking");
        assert!(message.text.contains("NGN 1500.50"));
        assert!(message.text.contains("ORD-77"));
        assert!(message.html.contains("<code>ORD-77</code>"));
    }

    #[test]
    fn test_failure_email() {
        let message = payment_outcome(&session("Ada"), NotificationKind::PaymentFailure);
        assert!(message.subject.contains("did not go through"));
        assert!(message.text.contains("No money was taken"));
    }

    #[test]
    fn test_html_is_escaped() {
        let message = payment_outcome(
            &session("<script>alert(1)</script>"),
            NotificationKind::PaymentSuccess,
        );
        assert!(!message.html.contains("<script>"));
        assert!(message.html.contains("&lt;script&gt;"));
    }
}
