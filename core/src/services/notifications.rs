// core/src/services/notifications.rs

//! Customer-facing email and SMS messages.
//!
//! Delivery goes through a `MessageSender`. The default `LogSender` only logs
//! what it would send. Every `Notifier`
//! method swallows delivery failures: a customer not receiving a message must
//! never fail the payment or order flow that triggered it.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::ShopResult;
use crate::models::{format_currency, MobilePayment, Order, PaymentStatus, User};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
  Email,
  Sms,
}

/// Receipt for one delivered message.
#[derive(Debug, Clone)]
pub struct SentMessage {
  pub channel: Channel,
  pub to: String,
  pub subject: Option<String>,
  pub body: String,
  pub message_id: String,
}

#[async_trait]
pub trait MessageSender: Send + Sync {
  async fn send_email(&self, to: &str, subject: &str, body: &str) -> ShopResult<SentMessage>;
  async fn send_sms(&self, to: &str, body: &str) -> ShopResult<SentMessage>;
}

pub struct LogSender {
  email_from: String,
  sms_sender_id: String,
}

impl LogSender {
  pub fn new(email_from: impl Into<String>, sms_sender_id: impl Into<String>) -> Self {
    Self {
      email_from: email_from.into(),
      sms_sender_id: sms_sender_id.into(),
    }
  }
}

#[async_trait]
impl MessageSender for LogSender {
  async fn send_email(&self, to: &str, subject: &str, body: &str) -> ShopResult<SentMessage> {
    info!(
      "Simulating sending email: To='{}', From='{}', Subject='{}'",
      to, self.email_from, subject
    );
    let message_id = format!("email_{}", Uuid::new_v4());
    Ok(SentMessage {
      channel: Channel::Email,
      to: to.to_string(),
      subject: Some(subject.to_string()),
      body: body.to_string(),
      message_id,
    })
  }

  async fn send_sms(&self, to: &str, body: &str) -> ShopResult<SentMessage> {
    let msisdn = international_msisdn(to);
    info!("Simulating sending SMS: To='{}', From='{}'", msisdn, self.sms_sender_id);
    Ok(SentMessage {
      channel: Channel::Sms,
      to: msisdn,
      subject: None,
      body: body.to_string(),
      message_id: format!("sms_{}", Uuid::new_v4()),
    })
  }
}

/// Digits only, with a local `07…` number rewritten to `2567…`.
pub fn international_msisdn(phone: &str) -> String {
  let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
  if digits.len() == 10 && digits.starts_with('0') {
    format!("256{}", &digits[1..])
  } else {
    digits
  }
}

fn payment_label(payment: &MobilePayment, order: Option<&Order>) -> String {
  match order {
    Some(order) => format!("order #{}", order.order_number),
    None => format!("payment {}", payment.provider_tx_ref),
  }
}

#[derive(Clone)]
pub struct Notifier {
  sender: Arc<dyn MessageSender>,
}

impl Notifier {
  pub fn new(sender: Arc<dyn MessageSender>) -> Self {
    Self { sender }
  }

  async fn email(&self, to: &str, subject: &str, body: &str) {
    if let Err(e) = self.sender.send_email(to, subject, body).await {
      warn!(error = %e, recipient = %to, "Email delivery failed; continuing.");
    }
  }

  async fn sms(&self, to: &str, body: &str) {
    if let Err(e) = self.sender.send_sms(to, body).await {
      warn!(error = %e, recipient = %to, "SMS delivery failed; continuing.");
    }
  }

  #[instrument(skip(self, user), fields(user_id = %user.id))]
  pub async fn welcome(&self, user: &User) {
    let body = format!(
      "Hello {},\n\nWelcome to UrbanHerb! Your account is ready.",
      user.full_name()
    );
    self.email(&user.email, "Welcome to UrbanHerb", &body).await;
  }

  #[instrument(skip_all, fields(payment_id = %payment.id))]
  pub async fn payment_initiated(&self, user: &User, payment: &MobilePayment, order: Option<&Order>) {
    let label = payment_label(payment, order);
    let amount = format_currency(payment.amount);
    let subject = format!("Payment Initiated - {}", label);
    let body = format!(
      "Hello {},\n\nA {} mobile money payment of {} has been initiated for {}. Reference: {}.",
      user.full_name(),
      payment.provider_code,
      amount,
      label,
      payment.provider_tx_ref
    );
    self.email(&user.email, &subject, &body).await;
    let sms = format!(
      "Payment of {} initiated for {}. Please check your phone for the payment prompt.",
      amount, label
    );
    self.sms(&payment.phone_number, &sms).await;
  }

  #[instrument(skip_all, fields(payment_id = %payment.id, status = %payment.status))]
  pub async fn payment_status(&self, user: &User, payment: &MobilePayment, order: Option<&Order>) {
    let label = payment_label(payment, order);
    let amount = format_currency(payment.amount);
    let subject = format!("Payment {} - {}", payment.status, label);
    let body = format!(
      "Hello {},\n\nYour payment of {} for {} is now {}.",
      user.full_name(),
      amount,
      label,
      payment.status
    );
    self.email(&user.email, &subject, &body).await;

    let outcome = match payment.status {
      PaymentStatus::Successful => "successful",
      PaymentStatus::Failed => "failed",
      _ => return,
    };
    let sms = format!(
      "Payment of {} for {} was {}. Thank you for using our service.",
      amount, label, outcome
    );
    self.sms(&payment.phone_number, &sms).await;
  }

  #[instrument(skip_all, fields(payment_id = %payment.id))]
  pub async fn payment_reminder(&self, user: &User, payment: &MobilePayment, order: Option<&Order>) {
    let label = payment_label(payment, order);
    let amount = format_currency(payment.amount);
    let subject = format!("Payment Reminder - {}", label);
    let body = format!(
      "Hello {},\n\nYour payment of {} for {} is still pending.",
      user.full_name(),
      amount,
      label
    );
    self.email(&user.email, &subject, &body).await;
    let sms = format!(
      "Reminder: Your payment of {} for {} is pending. Please complete the payment to avoid order cancellation.",
      amount, label
    );
    self.sms(&payment.phone_number, &sms).await;
  }

  #[instrument(skip_all, fields(order_id = %order.id))]
  pub async fn order_confirmation(&self, user: &User, order: &Order) {
    let subject = format!("Order Confirmation - #{}", order.order_number);
    let body = format!(
      "Hello {},\n\nThank you for your order #{}. Total: {}. Status: {}.",
      user.full_name(),
      order.order_number,
      format_currency(order.total),
      order.status
    );
    self.email(&user.email, &subject, &body).await;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn local_numbers_get_country_code() {
    assert_eq!(international_msisdn("0772 123 456"), "256772123456");
    assert_eq!(international_msisdn("+256-772-123456"), "256772123456");
  }

  #[tokio::test]
  async fn log_sender_accepts_every_message() {
    let sender = LogSender::new("noreply@urbanherb.example", "URBANHERB");
    for subject in ["Hello", "FAIL_TEST please", ""] {
      let sent = sender.send_email("a@b.c", subject, "body").await.unwrap();
      assert_eq!(sent.subject.as_deref(), Some(subject));
      assert!(sent.message_id.starts_with("email_"));
    }
    let sms = sender.send_sms("0772123456", "hi").await.unwrap();
    assert_eq!(sms.to, "256772123456");
    assert_eq!(sms.channel, Channel::Sms);
  }
}
