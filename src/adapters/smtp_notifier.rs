//! Plain-text email notifier over SMTP: plaintext, STARTTLS or implicit TLS.

use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};

use crate::domain::config::NotifyTls;
use crate::domain::error::TradeArenaError;
use crate::ports::config_port::ConfigPort;
use crate::ports::notify_port::{NotifyError, Notifier};

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub tls: NotifyTls,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub to: Vec<String>,
}

impl SmtpConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TradeArenaError> {
        let required = |key: &str| {
            config
                .get_string("notify", key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| TradeArenaError::ConfigMissing {
                    section: "notify".into(),
                    key: key.into(),
                })
        };
        let tls = match config.get_string("notify", "tls") {
            Some(raw) => raw
                .parse::<NotifyTls>()
                .map_err(|reason| TradeArenaError::ConfigInvalid {
                    section: "notify".into(),
                    key: "tls".into(),
                    reason,
                })?,
            None => NotifyTls::default(),
        };
        let port = config.get_int("notify", "port", i64::from(tls.default_port()));
        let port = u16::try_from(port).map_err(|_| TradeArenaError::ConfigInvalid {
            section: "notify".into(),
            key: "port".into(),
            reason: format!("{port} is not a valid port"),
        })?;

        Ok(SmtpConfig {
            host: required("host")?,
            tls,
            port,
            username: config.get_string("notify", "username"),
            password: config.get_string("notify", "password"),
            from: required("from")?,
            to: required("to")?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }
}

pub struct SmtpNotifier {
    mailer: SmtpTransport,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Result<Self, NotifyError> {
        let relay_err = |e: lettre::transport::smtp::Error| NotifyError::Setup(e.to_string());
        let mut builder = match config.tls {
            NotifyTls::None => SmtpTransport::builder_dangerous(&config.host),
            NotifyTls::StartTls => SmtpTransport::starttls_relay(&config.host).map_err(relay_err)?,
            NotifyTls::Ssl => SmtpTransport::relay(&config.host).map_err(relay_err)?,
        }
        .port(config.port);
        if let (Some(user), Some(pass)) = (config.username, config.password) {
            builder = builder.credentials(Credentials::new(user, pass));
        }

        let from = config
            .from
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Setup(e.to_string()))?;
        let to = config
            .to
            .iter()
            .map(|addr| {
                addr.parse()
                    .map_err(|e: lettre::address::AddressError| NotifyError::Setup(e.to_string()))
            })
            .collect::<Result<Vec<Mailbox>, _>>()?;
        if to.is_empty() {
            return Err(NotifyError::Setup("no recipients".into()));
        }

        Ok(Self {
            mailer: builder.build(),
            from,
            to,
        })
    }
}

impl Notifier for SmtpNotifier {
    fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let mut builder = Message::builder().from(self.from.clone()).subject(subject);
        for to in &self.to {
            builder = builder.to(to.clone());
        }
        let email = builder
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        self.mailer
            .send(&email)
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    #[test]
    fn config_reads_recipients() {
        let config = FileConfigAdapter::from_string(
            "[notify]\nhost = localhost\nport = 2525\nfrom = arena@example.com\nto = a@example.com, b@example.com\n",
        )
        .unwrap();
        let smtp = SmtpConfig::from_config(&config).unwrap();
        assert_eq!(smtp.tls, NotifyTls::StartTls);
        assert_eq!(smtp.port, 2525);
        assert_eq!(smtp.to, vec!["a@example.com", "b@example.com"]);
        assert!(smtp.username.is_none());
    }

    #[test]
    fn config_requires_host() {
        let config =
            FileConfigAdapter::from_string("[notify]\nfrom = a@example.com\nto = b@example.com\n")
                .unwrap();
        assert!(matches!(
            SmtpConfig::from_config(&config),
            Err(TradeArenaError::ConfigMissing { key, .. }) if key == "host"
        ));
    }

    fn smtp(tls: NotifyTls) -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".into(),
            tls,
            port: tls.default_port(),
            username: Some("arena".into()),
            password: Some("secret".into()),
            from: "arena@example.com".into(),
            to: vec!["desk@example.com".into()],
        }
    }

    #[test]
    fn tls_mode_sets_default_port() {
        let config = FileConfigAdapter::from_string(
            "[notify]\nhost = smtp.example.com\ntls = ssl\nfrom = a@example.com\nto = b@example.com\n",
        )
        .unwrap();
        let smtp = SmtpConfig::from_config(&config).unwrap();
        assert_eq!(smtp.tls, NotifyTls::Ssl);
        assert_eq!(smtp.port, 465);
    }

    #[test]
    fn unknown_tls_mode_is_config_error() {
        let config = FileConfigAdapter::from_string(
            "[notify]\nhost = h\ntls = yes\nfrom = a@example.com\nto = b@example.com\n",
        )
        .unwrap();
        assert!(matches!(
            SmtpConfig::from_config(&config),
            Err(TradeArenaError::ConfigInvalid { key, .. }) if key == "tls"
        ));
    }

    #[test]
    fn every_tls_mode_builds_a_transport() {
        for tls in [NotifyTls::None, NotifyTls::StartTls, NotifyTls::Ssl] {
            assert!(SmtpNotifier::new(smtp(tls)).is_ok(), "{tls:?}");
        }
    }

    #[test]
    fn bad_address_fails_setup() {
        let result = SmtpNotifier::new(SmtpConfig {
            host: "localhost".into(),
            tls: NotifyTls::None,
            port: 25,
            username: None,
            password: None,
            from: "not an address".into(),
            to: vec!["b@example.com".into()],
        });
        assert!(matches!(result, Err(NotifyError::Setup(_))));
    }
}
