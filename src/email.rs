use lettre::{
    message::Mailbox,
    transport::smtp::{
        authentication::Credentials, response::Response as LettreResponse, Error as LettreError,
    },
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::env::var;

lazy_static::lazy_static! {
    static ref EMAIL_USERNAME: String = var("EMAIL_USERNAME").expect("email username must be set for outbound notifications");
    static ref EMAIL_PASSWORD: String = var("EMAIL_PASSWORD").expect("email access password must be set for outbound notifications");
    static ref CREDS: Credentials = Credentials::new(EMAIL_USERNAME.to_string(), EMAIL_PASSWORD.to_string());
    pub static ref EMAIL_ADDRESS: Address = EMAIL_USERNAME.parse::<Address>().expect("invalid email username");
}

pub const SENDER_NAME: &str = "Campus Connect";

pub async fn sanity_check() -> Result<LettreResponse, LettreError> {
    let mbox = Mailbox::new(None, EMAIL_ADDRESS.clone());
    let email = Message::builder()
        .from(mbox.clone())
        .to(mbox)
        .subject("Ensuring provided email is valid")
        .body("SANITY CHECK".to_string())
        .expect("sanity check message must build");

    send_message(email).await
}

pub async fn send_message(msg: Message) -> Result<LettreResponse, LettreError> {
    let mailer: AsyncSmtpTransport<Tokio1Executor> =
        AsyncSmtpTransport::<Tokio1Executor>::relay("smtp.gmail.com")
            .expect("smtp relay configuration is static")
            .credentials(CREDS.clone())
            .build();

    mailer.send(msg).await
}

/// Builds and sends one plain-text message.
pub async fn send(
    to: &str,
    to_name: &str,
    subject: &str,
    body: String,
) -> anyhow::Result<LettreResponse> {
    let destination = to.parse::<Address>()?;
    let email = Message::builder()
        .from(Mailbox::new(
            Some(SENDER_NAME.to_string()),
            EMAIL_ADDRESS.clone(),
        ))
        .to(Mailbox::new(Some(to_name.to_string()), destination))
        .subject(subject)
        .body(body)?;

    Ok(send_message(email).await?)
}

/// Fire-and-forget send. The primary state transition has already been
/// committed by the time this runs, so a delivery failure is only logged.
pub fn send_best_effort(to: String, to_name: String, subject: String, body: String) {
    tokio::spawn(async move {
        if let Err(e) = send(&to, &to_name, &subject, body).await {
            tracing::warn!(recipient = %to, subject = %subject, error = %e, "failed to send email");
        }
    });
}
