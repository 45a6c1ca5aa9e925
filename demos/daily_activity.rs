//! Resumes a persisted session and fetches today's activity summary, letting
//! the token-change hook rewrite the token file whenever a silent refresh
//! rotates the secrets.
//!
//! ```sh
//! FITBIT_CLIENT_ID=.. FITBIT_CLIENT_SECRET=.. FITBIT_TOKEN_FILE=token.json \
//!     cargo run --example daily_activity
//! ```

// std
use std::fs;
// crates.io
use color_eyre::Result;
use url::Url;
// self
use fitbit_session::{
	scope::Scope,
	session::{Config, ReqwestSession},
	token::Token,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let token_file = std::env::var("FITBIT_TOKEN_FILE")?;
	let token: Token = serde_json::from_slice(&fs::read(&token_file)?)?;
	let config = Config {
		client_id: std::env::var("FITBIT_CLIENT_ID")?,
		client_secret: std::env::var("FITBIT_CLIENT_SECRET")?,
		redirect_url: Url::parse("https://localhost:8080/callback")?,
		scopes: vec![Scope::Activity],
	};
	let session = ReqwestSession::new(config)?;

	session.set_token(token);
	session.on_token_change(move |token| {
		let path = token_file.clone();

		Box::pin(async move {
			match serde_json::to_vec_pretty(&token) {
				Ok(encoded) =>
					if let Err(e) = fs::write(&path, encoded) {
						eprintln!("Failed to persist the rotated token: {e}");
					},
				Err(e) => eprintln!("Failed to serialize the rotated token: {e}"),
			}
		})
	});

	let body =
		session.get("https://api.fitbit.com/1/user/-/activities/date/today.json").await?;

	println!("{}", String::from_utf8_lossy(&body));

	let ratelimit = session.ratelimit();

	println!(
		"rate limit: {} spent of {}, resets at {:?}",
		ratelimit.used, ratelimit.available, ratelimit.reset_at,
	);

	Ok(())
}
