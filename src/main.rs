//! Command-line front end: send one request and print the response.

use std::path::PathBuf;
use std::process::ExitCode;

use bytes::Bytes;
use clap::Parser;
use serde_json::json;
use url::Url;

use service_dispatch::config::{load_config, ClientConfig};
use service_dispatch::observability::init_logging;
use service_dispatch::{DispatchError, HttpClient, HttpRequest};

#[derive(Parser)]
#[command(name = "service-dispatch")]
#[command(about = "Send an HTTP request, optionally through a CONNECT proxy", long_about = None)]
struct Cli {
    /// Request method, e.g. GET
    method: String,

    /// Full URL, e.g. https://account.blob.core.windows.net/container?restype=container
    url: String,

    /// TOML client configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Request header as name:value (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Request body
    #[arg(short, long, conflicts_with = "data_file")]
    data: Option<String>,

    /// Read the request body from a file
    #[arg(long)]
    data_file: Option<PathBuf>,

    /// Proxy as host:port
    #[arg(long)]
    proxy: Option<String>,

    #[arg(long, requires = "proxy")]
    proxy_user: Option<String>,

    #[arg(long, requires = "proxy")]
    proxy_password: Option<String>,

    /// Print the response as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    init_logging(&config.observability);

    tracing::info!(
        service = %config.service,
        protocol = %config.protocol,
        backend = ?config.connection.backend,
        "Configuration loaded"
    );

    let mut client = HttpClient::new(config);
    if let Some(proxy) = &cli.proxy {
        let (host, port) = split_host_port(proxy)?;
        client.set_proxy(host, port, cli.proxy_user.clone(), cli.proxy_password.clone());
    }

    let request = build_request(&cli).await?;
    match client.perform_request(&request).await {
        Ok(response) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_text(response.status, &response.reason, &response.headers, response.body.as_ref());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(DispatchError::RequestFailed(err)) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&json!({ "error": err }))?);
            } else {
                print_text(err.status, &err.reason, &err.headers, err.body.as_ref());
            }
            Ok(ExitCode::from(1))
        }
        Err(e) => Err(e.into()),
    }
}

async fn build_request(cli: &Cli) -> Result<HttpRequest, Box<dyn std::error::Error>> {
    let url = Url::parse(&cli.url)?;
    let host = url
        .host_str()
        .ok_or_else(|| format!("URL has no host: {}", cli.url))?;

    let path = match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    };

    let mut request = HttpRequest::new(cli.method.to_uppercase(), host, path).protocol(url.scheme());
    if let Some(port) = url.port() {
        request = request.port(port);
    }

    for header in &cli.headers {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| format!("Header must be name:value, got {:?}", header))?;
        request = request.header(name.trim(), value.trim());
    }

    let body = match (&cli.data, &cli.data_file) {
        (Some(data), _) => Some(Bytes::from(data.clone())),
        (None, Some(path)) => Some(Bytes::from(tokio::fs::read(path).await?)),
        (None, None) => None,
    };
    if let Some(body) = body {
        request = request.body(body);
    }
    Ok(request)
}

fn split_host_port(value: &str) -> Result<(String, u16), Box<dyn std::error::Error>> {
    let (host, port) = value
        .rsplit_once(':')
        .ok_or_else(|| format!("Proxy must be host:port, got {:?}", value))?;
    Ok((host.to_string(), port.parse()?))
}

fn print_text(status: u16, reason: &str, headers: &[(String, String)], body: Option<&Bytes>) {
    println!("{} {}", status, reason);
    for (name, value) in headers {
        println!("{}: {}", name, value);
    }
    if let Some(body) = body {
        println!();
        println!("{}", String::from_utf8_lossy(body));
    }
}
