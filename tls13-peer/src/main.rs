//! `tls13-peer`: a TLS 1.3 server or client for interop testing.
//!
//! ```text
//! tls13-peer server --port 4433 --cert end.chain --key end.key --group secp384r1
//! tls13-peer client --host 127.0.0.1 --port 4433 --server-name testserver.com \
//!     --ca ca.cert --group secp256r1 --group secp384r1 --key-share secp256r1
//! ```
//!
//! Names of suites, groups and signature schemes are case-insensitive.
//! Set `RUST_LOG` for finer control of the log than `--verbose` gives, and
//! `SSLKEYLOGFILE` to record secrets for a packet capture.

use std::net::{Ipv4Addr, TcpListener};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tls13_peer::{
    make_client_config, make_server_config, run_client, serve_forever, ClientOptions, PeerError,
    ServerOptions,
};

#[derive(Debug, Parser)]
#[command(version, about = "TLS 1.3 interop peer")]
struct Args {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Answer `GET /` requests with a canned HTTP/1.0 response.
    Server(ServerArgs),
    /// Make one `GET /` request and print the response.
    Client(ClientArgs),
}

#[derive(Debug, clap::Args)]
struct ServerArgs {
    /// Listen on port.
    #[clap(short, long, default_value = "4433")]
    port: u16,
    /// PEM certificate chain, end-entity first.
    #[clap(long)]
    cert: PathBuf,
    /// PEM PKCS#8 private key.
    #[clap(long)]
    key: PathBuf,
    /// Accept only these cipher suites, most preferred first.
    #[clap(long)]
    suite: Vec<String>,
    /// Accept only these groups, most preferred first.
    #[clap(long)]
    group: Vec<String>,
    /// Put a cookie in every HelloRetryRequest.
    #[clap(long)]
    hrr_cookie: bool,
    /// Emit debug log output.
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Debug, clap::Args)]
struct ClientArgs {
    /// Connect to this host.
    #[clap(long, default_value = "127.0.0.1")]
    host: String,
    /// Connect to this port.
    #[clap(short, long, default_value = "4433")]
    port: u16,
    /// Verify the server's certificate for this name.  Defaults to `--host`.
    #[clap(long)]
    server_name: Option<String>,
    /// PEM file of trusted roots.
    #[clap(long)]
    ca: PathBuf,
    /// Offer only these cipher suites, in this order.
    #[clap(long)]
    suite: Vec<String>,
    /// Advertise only these groups, in this order.
    #[clap(long)]
    group: Vec<String>,
    /// Send key shares for these groups in the first ClientHello.
    #[clap(long)]
    key_share: Vec<String>,
    /// Offer only these signature schemes.
    #[clap(long)]
    sig_alg: Vec<String>,
    /// Turn off middlebox compatibility mode.
    #[clap(long)]
    no_compat: bool,
    /// Emit debug log output.
    #[clap(short, long)]
    verbose: bool,
}

impl Mode {
    fn verbose(&self) -> bool {
        match self {
            Self::Server(args) => args.verbose,
            Self::Client(args) => args.verbose,
        }
    }
}

fn server(args: ServerArgs) -> Result<(), PeerError> {
    let config = make_server_config(&ServerOptions {
        cert: args.cert,
        key: args.key,
        suites: args.suite,
        groups: args.group,
        hrr_cookie: args.hrr_cookie,
    })?;

    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, args.port))?;
    println!("listening on {}", listener.local_addr()?);
    serve_forever(&listener, config)?;
    Ok(())
}

fn client(args: ClientArgs) -> Result<(), PeerError> {
    let (config, server_name) = make_client_config(&ClientOptions {
        server_name: args
            .server_name
            .unwrap_or_else(|| args.host.clone()),
        ca: args.ca,
        suites: args.suite,
        groups: args.group,
        key_shares: args.key_share,
        sig_algs: args.sig_alg,
        no_compat: args.no_compat,
    })?;

    let (negotiated, response) = run_client(&args.host, args.port, config, server_name)?;
    println!("{}", negotiated);
    print!("{}", String::from_utf8_lossy(&response));
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_filter = match args.mode.verbose() {
        true => "debug",
        false => "warn",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let result = match args.mode {
        Mode::Server(args) => server(args),
        Mode::Client(args) => client(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("tls13-peer: {}", err);
            ExitCode::FAILURE
        }
    }
}
