// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Coffer administrative CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use coffer_server::{key_paths, Coffer, CofferError};
use coffer_server_config::{ServerConfig, StorageBackend};
use coffer_server_db::Application;
use coffer_server_keys::{bootstrap, public_key_fingerprint};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod version;

/// Coffer - encrypted per-application secrets.
#[derive(Parser, Debug)]
#[command(name = "coffer-server", about = "Coffer secrets vault administration", version)]
struct Cli {
	/// Config file to use instead of /etc/coffer/server.toml
	#[arg(long, global = true, env = "COFFER_SERVER_CONFIG")]
	config: Option<PathBuf>,

	/// Print applications as JSON
	#[arg(long, global = true)]
	json: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Create missing key material and print the public key fingerprint
	Keys,
	/// Manage applications
	#[command(subcommand)]
	App(AppCommand),
	/// Issue and check bearer tokens
	#[command(subcommand)]
	Token(TokenCommand),
	/// Manage an application's secrets
	#[command(subcommand)]
	Secret(SecretCommand),
	/// Show version and build information
	Version,
}

#[derive(Subcommand, Debug)]
enum AppCommand {
	/// Create an application and issue its first token
	Create { name: String },
	/// Show one application, by id or name
	Get { app: String },
	List(PageArgs),
	Rename { app: String, name: String },
	/// Delete an application with all of its secrets and tokens
	Delete { app: String },
}

#[derive(Subcommand, Debug)]
enum TokenCommand {
	Issue { app: String },
	/// Exit non-zero unless the token is valid
	Verify { token: String },
}

#[derive(Subcommand, Debug)]
enum SecretCommand {
	Put { app: String, key: String, value: String },
	/// Print the requested secrets as KEY=VALUE lines
	Get {
		app: String,
		#[arg(required = true)]
		keys: Vec<String>,
	},
	List {
		app: String,
		#[command(flatten)]
		page: PageArgs,
	},
	/// Replace a secret's value, optionally renaming it
	Update {
		app: String,
		key: String,
		value: String,
		#[arg(long)]
		rename: Option<String>,
	},
	Delete { app: String, key: String },
}

#[derive(Args, Debug)]
struct PageArgs {
	#[arg(long, default_value_t = 1)]
	page: u32,
	#[arg(long, default_value_t = 50)]
	per_page: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let cli = Cli::parse();

	if let Command::Version = cli.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = match &cli.config {
		Some(path) => coffer_server_config::load_config_with_file(path)?,
		None => coffer_server_config::load_config()?,
	};

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();

	if config.database.backend == StorageBackend::Document {
		tracing::warn!("document backend keeps data in memory; nothing outlives this process");
	}

	match cli.command {
		Command::Keys => keys(&config),
		Command::App(cmd) => app(&Coffer::open(&config).await?, cmd, cli.json).await,
		Command::Token(cmd) => token(&Coffer::open(&config).await?, cmd).await,
		Command::Secret(cmd) => secret(&Coffer::open(&config).await?, cmd).await,
		Command::Version => Ok(()),
	}
}

fn keys(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
	if config.master_key.is_some() {
		println!("Master key is supplied through the environment; key files are not used.");
		return Ok(());
	}

	let paths = key_paths(config);
	bootstrap(&paths)?;
	println!("Private key: {}", paths.private_key.display());
	println!("Public key:  {}", paths.public_key.display());
	println!("Secret key:  {}", paths.secret_key.display());
	println!("Fingerprint: {}", public_key_fingerprint(&paths)?);
	Ok(())
}

async fn app(coffer: &Coffer, cmd: AppCommand, json: bool) -> Result<(), Box<dyn std::error::Error>> {
	match cmd {
		AppCommand::Create { name } => {
			let app = coffer.create_application(&name).await?;
			let token = coffer.tokens().generate(&app.id).await?;
			print_application(&app, json)?;
			println!("Auth Token: {}", token.expose());
		}
		AppCommand::Get { app } => {
			print_application(&coffer.resolve_application(&app).await?, json)?;
		}
		AppCommand::List(page) => {
			let listed = coffer.list_applications(page.page, page.per_page).await?;
			if json {
				println!("{}", serde_json::to_string_pretty(&listed.applications)?);
			} else {
				for app in &listed.applications {
					println!("ID: {}, Name: {}", app.id, app.name);
				}
				println!("Total: {}", listed.total);
			}
		}
		AppCommand::Rename { app, name } => {
			let app = coffer.resolve_application(&app).await?;
			print_application(&coffer.rename_application(&app.id, &name).await?, json)?;
		}
		AppCommand::Delete { app } => {
			let app = coffer.resolve_application(&app).await?;
			coffer.delete_application(&app.id).await?;
			println!("Deleted application {} ({})", app.name, app.id);
		}
	}
	Ok(())
}

async fn token(coffer: &Coffer, cmd: TokenCommand) -> Result<(), Box<dyn std::error::Error>> {
	match cmd {
		TokenCommand::Issue { app } => {
			let app = coffer.resolve_application(&app).await?;
			let token = coffer.tokens().generate(&app.id).await?;
			println!("{}", token.expose());
		}
		TokenCommand::Verify { token } => match coffer.tokens().verify(&token).await {
			Some(app) => println!("Valid token for application {} ({})", app.name, app.id),
			None => return Err(CofferError::NotFound("valid token".to_string()).into()),
		},
	}
	Ok(())
}

async fn secret(coffer: &Coffer, cmd: SecretCommand) -> Result<(), Box<dyn std::error::Error>> {
	match cmd {
		SecretCommand::Put { app, key, value } => {
			let app = coffer.resolve_application(&app).await?;
			coffer.secrets().create(&app.id, &key, &value).await?;
			println!("Stored {key}");
		}
		SecretCommand::Get { app, keys } => {
			let app = coffer.resolve_application(&app).await?;
			let found = coffer.secrets().get(&app.id, &keys).await?;
			for key in &keys {
				match found.get(key) {
					Some(value) => println!("{key}={}", value.expose()),
					None => tracing::warn!(key = %key, "secret not found"),
				}
			}
		}
		SecretCommand::List { app, page } => {
			let app = coffer.resolve_application(&app).await?;
			let secrets = coffer
				.secrets()
				.paginate(&app.id, i64::from(page.page), i64::from(page.per_page))
				.await?;
			for (key, value) in &secrets {
				println!("{key}={}", value.expose());
			}
		}
		SecretCommand::Update {
			app,
			key,
			value,
			rename,
		} => {
			let app = coffer.resolve_application(&app).await?;
			let new_key = rename.as_deref().unwrap_or(&key);
			coffer.secrets().update(&app.id, &key, new_key, &value).await?;
			println!("Updated {new_key}");
		}
		SecretCommand::Delete { app, key } => {
			let app = coffer.resolve_application(&app).await?;
			coffer.secrets().delete(&app.id, &key).await?;
			println!("Deleted {key}");
		}
	}
	Ok(())
}

fn print_application(app: &Application, json: bool) -> Result<(), serde_json::Error> {
	if json {
		println!("{}", serde_json::to_string_pretty(app)?);
	} else {
		println!("ID: {}, Name: {}", app.id, app.name);
	}
	Ok(())
}
