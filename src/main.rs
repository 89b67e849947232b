// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use debtclip::{cli, commands, db};

fn init_logging() {
    let filter = EnvFilter::try_from_env("DEBTCLIP_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = cli::build_cli();
    let matches = cli.get_matches();

    let mut conn = db::open_or_init()?;

    match matches.subcommand() {
        Some(("init", _)) => {
            println!("Database initialized at {}", db::db_path()?.display());
        }
        Some(("simulate", sub)) => commands::simulate::handle(&conn, sub)?,
        Some(("tiers", sub)) => commands::simulate::tiers(sub)?,
        Some(("agreement", sub)) => commands::agreements::handle(&mut conn, sub)?,
        Some(("plan", sub)) => commands::plans::handle(&mut conn, sub)?,
        Some(("verify", sub)) => commands::verify::handle(&conn, sub)?,
        Some(("export", sub)) => commands::exporter::handle(&conn, sub)?,
        Some(("settings", sub)) => commands::settings::handle(&conn, sub)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
