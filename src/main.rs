use dotenvy::dotenv;
use herbarium_bot::config::Settings;
use herbarium_bot::runner::run_bot;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting the bot token from log output
struct RedactionPatterns {
    token1: Regex,
    token2: Regex,
    token3: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token1: Regex::new(r"(https?://[^/]+/(?:file/)?bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            token2: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            token3: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let output = self.token1.replace_all(input, "$1[TELEGRAM_TOKEN]$3");
        let output = self.token2.replace_all(&output, "[TELEGRAM_TOKEN]");
        self.token3
            .replace_all(&output, "$1[TELEGRAM_TOKEN]")
            .into_owned()
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the original length; the redacted text may be shorter or longer
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Initialize redaction patterns early (before logging)
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting Herbarium Bot...");

    let settings = init_settings();
    run_bot(settings).await;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);

    let debug_mode = std::env::var("DEBUG_MODE")
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false);
    let default_filter = if debug_mode {
        "herbarium_bot=debug,teloxide=info,reqwest=warn,hyper=warn"
    } else {
        "herbarium_bot=info,teloxide=warn,reqwest=warn,hyper=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_token_in_api_url() -> Result<(), regex::Error> {
        let patterns = RedactionPatterns::new()?;
        let line = "error sending request for url (https://api.telegram.org/bot123456789:AAAbbbCCCdddEEEfffGGGhhhIIIjjjKKKl/getFile)";

        let redacted = patterns.redact(line);

        assert!(!redacted.contains("AAAbbb"));
        assert!(redacted.contains("/bot[TELEGRAM_TOKEN]/getFile"));
        Ok(())
    }

    #[test]
    fn test_leaves_plain_text_alone() -> Result<(), regex::Error> {
        let patterns = RedactionPatterns::new()?;
        assert_eq!(patterns.redact("Bot is running..."), "Bot is running...");
        Ok(())
    }
}
