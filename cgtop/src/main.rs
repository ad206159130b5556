//! Entry point for the cgtop TUI. Parses args and runs the App.

mod app;
mod ui;

use cgtop::{types, ws};

use app::App;
use std::env;

const DEFAULT_URL: &str = "ws://127.0.0.1:3000/ws";

#[derive(Debug, PartialEq)]
struct ParsedArgs {
    url: String,
    tls_ca: Option<String>,
}

enum Cli {
    Run(ParsedArgs),
    Help(String),
}

fn usage(prog: &str) -> String {
    format!(
        "Usage: {prog} [--tls-ca CERT_PEM|-t CERT_PEM] [ws://HOST:PORT/ws | wss://HOST:PORT/ws]\n\
         \n\
         Defaults to {DEFAULT_URL}. Use --tls-ca with the agent's cert.pem for wss://."
    )
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Cli, String> {
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "cgtop".into());
    let mut url: Option<String> = None;
    let mut tls_ca: Option<String> = None;

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Cli::Help(usage(&prog))),
            "--tls-ca" | "-t" => {
                tls_ca = Some(it.next().ok_or_else(|| format!("--tls-ca needs a path\n{}", usage(&prog)))?);
            }
            _ if arg.starts_with("--tls-ca=") => {
                if let Some((_, v)) = arg.split_once('=') {
                    if !v.is_empty() {
                        tls_ca = Some(v.to_string());
                    }
                }
            }
            _ => {
                if url.is_none() {
                    url = Some(arg);
                } else {
                    return Err(format!("Unexpected argument {arg}.\n{}", usage(&prog)));
                }
            }
        }
    }

    let url = url.unwrap_or_else(|| DEFAULT_URL.to_string());
    let parsed = url::Url::parse(&url).map_err(|e| format!("invalid URL {url}: {e}"))?;
    if !matches!(parsed.scheme(), "ws" | "wss") {
        return Err(format!("URL must start with ws:// or wss://, got {url}"));
    }
    Ok(Cli::Run(ParsedArgs { url, tls_ca }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let parsed = match parse_args(env::args()) {
        Ok(Cli::Run(p)) => p,
        Ok(Cli::Help(text)) => {
            println!("{text}");
            return Ok(());
        }
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };

    let mut app = App::new(&parsed.url);
    app.run(parsed.tls_ca.as_deref()).await
}
