// Report email over SMTP (STARTTLS + password login)

use cardops_config::secrets::{smtp_password, SMTP_PASSWORD_ENV};
use cardops_config::settings::MailSettings;
use chrono::NaiveDate;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::CliError;

/// A finished report ready to attach.
pub(crate) struct Report<'a> {
    pub bank: &'a str,
    pub date: NaiveDate,
    pub file_name: &'a str,
    pub bytes: Vec<u8>,
}

pub(crate) fn not_configured() -> CliError {
    CliError::mail("mail is not configured")
        .with_hint("set mail.username and mail.to in settings.toml")
}

pub(crate) fn subject(bank: &str, date: NaiveDate) -> String {
    format!("{} Google Ads MIS Report - {}", bank, date.format("%d-%b-%Y"))
}

pub(crate) fn body(bank: &str, signature: &str) -> String {
    format!(
        "Hello,\n\n\
         Please find attached the Google Ads {bank} MIS report for your review.\n\n\
         Key Highlights:\n\
         - Total Google Ads Campaigns Processed\n\
         - MIS Match Analysis\n\
         - Pivot Tables and Detailed Breakdowns\n\n\
         Best Regards,\n\
         {signature}"
    )
}

fn mailbox(address: &str) -> Result<Mailbox, CliError> {
    address
        .trim()
        .parse()
        .map_err(|e| CliError::mail(format!("invalid address '{address}': {e}")))
}

/// Plain-text body plus the workbook as `application/octet-stream`.
pub(crate) fn build_message(settings: &MailSettings, report: &Report<'_>) -> Result<Message, CliError> {
    let mut builder = Message::builder()
        .from(mailbox(settings.effective_from())?)
        .subject(subject(report.bank, report.date));
    for to in &settings.to {
        builder = builder.to(mailbox(to)?);
    }
    for cc in &settings.cc {
        builder = builder.cc(mailbox(cc)?);
    }

    let octet_stream = ContentType::parse("application/octet-stream")
        .map_err(|e| CliError::mail(e.to_string()))?;
    let attachment = Attachment::new(report.file_name.to_string()).body(report.bytes.clone(), octet_stream);

    builder
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(body(report.bank, &settings.signature)))
                .singlepart(attachment),
        )
        .map_err(|e| CliError::mail(format!("cannot build message: {e}")))
}

pub(crate) fn send_report(settings: &MailSettings, report: &Report<'_>) -> Result<(), CliError> {
    if !settings.is_configured() {
        return Err(not_configured());
    }
    let lookup = smtp_password(&settings.username);
    let Some(password) = lookup.secret else {
        return Err(CliError::mail("no SMTP password").with_hint(format!("set {SMTP_PASSWORD_ENV}")));
    };
    log::debug!("mail: SMTP password from {}", lookup.source.as_str());

    let message = build_message(settings, report)?;
    let transport = SmtpTransport::starttls_relay(&settings.smtp_host)
        .map_err(|e| CliError::mail(format!("SMTP setup failed for {}: {e}", settings.smtp_host)))?
        .port(settings.smtp_port)
        .credentials(Credentials::new(settings.username.clone(), password))
        .build();

    transport.send(&message).map_err(|e| {
        let hint = if e.is_permanent() {
            "check the SMTP username and password"
        } else {
            "check the SMTP host, port and network access"
        };
        CliError::mail(format!("sending failed: {e}")).with_hint(hint)
    })?;
    log::info!("mail: sent '{}' to {} recipient(s)", subject(report.bank, report.date), settings.to.len() + settings.cc.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> MailSettings {
        MailSettings {
            username: "reports@example.com".into(),
            to: vec!["ops@example.com".into()],
            cc: vec!["lead@example.com".into(), "audit@example.com".into()],
            ..MailSettings::default()
        }
    }

    fn report(bytes: Vec<u8>) -> Report<'static> {
        Report {
            bank: "HDFC",
            date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            file_name: "GoogleAds_HDFC_MIS_05-Mar-2024.xlsx",
            bytes,
        }
    }

    #[test]
    fn subject_has_bank_and_day() {
        assert_eq!(
            subject("HDFC", NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()),
            "HDFC Google Ads MIS Report - 05-Mar-2024"
        );
    }

    #[test]
    fn body_is_signed() {
        let text = body("HDFC", "Reporting Team");
        assert!(text.starts_with("Hello,"));
        assert!(text.ends_with("Best Regards,\nReporting Team"));
    }

    #[test]
    fn message_carries_recipients_and_attachment() {
        let message = build_message(&settings(), &report(b"PK\x03\x04".to_vec())).unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).into_owned();
        assert!(raw.contains("From: reports@example.com"));
        assert!(raw.contains("To: ops@example.com"));
        assert!(raw.contains("lead@example.com"));
        assert!(raw.contains("Subject: HDFC Google Ads MIS Report - 05-Mar-2024"));
        assert!(raw.contains("application/octet-stream"));
        assert!(raw.contains("GoogleAds_HDFC_MIS_05-Mar-2024.xlsx"));
    }

    #[test]
    fn bad_address_is_a_mail_error() {
        let mut s = settings();
        s.to = vec!["not an address".into()];
        let err = build_message(&s, &report(Vec::new())).unwrap_err();
        assert_eq!(err.code, crate::exit_codes::EXIT_MAIL);
    }

    #[test]
    fn unconfigured_mail_is_refused() {
        let err = send_report(&MailSettings::default(), &report(Vec::new())).unwrap_err();
        assert_eq!(err.code, crate::exit_codes::EXIT_MAIL);
    }
}
