//! Interactive authorization walkthrough: print the login URL, paste the
//! one-time code back, and receive a persistable token.
//!
//! ```sh
//! FITBIT_CLIENT_ID=.. FITBIT_CLIENT_SECRET=.. cargo run --example authorize
//! ```

// std
use std::io::{BufRead, Write, stdin, stdout};
// crates.io
use color_eyre::{Result, eyre::eyre};
use url::Url;
// self
use fitbit_session::{
	scope::Scope,
	session::{Config, ReqwestSession},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = Config {
		client_id: std::env::var("FITBIT_CLIENT_ID")?,
		client_secret: std::env::var("FITBIT_CLIENT_SECRET")?,
		redirect_url: Url::parse("https://localhost:8080/callback")?,
		scopes: vec![Scope::Activity, Scope::Heartrate, Scope::Sleep],
	};
	let session = ReqwestSession::new(config)?;
	let state = ReqwestSession::random_state();

	println!("Open the following URL and grant access:\n\n{}\n", session.login_url(&state));
	print!("Paste the `code` query parameter from the redirect: ");
	stdout().flush()?;

	let code = stdin()
		.lock()
		.lines()
		.next()
		.ok_or_else(|| eyre!("No authorization code was provided."))??;
	let token = session.exchange(code.trim()).await?;

	println!("\nPersist this token to resume the session later:");
	println!("{}", serde_json::to_string_pretty(&token)?);

	Ok(())
}
