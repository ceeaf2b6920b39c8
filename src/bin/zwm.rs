use std::{env, os::unix::process::CommandExt, process};

use anyhow::Result;
use simplelog::{LevelFilter, SimpleLogger};
use zwm::{wm::VERSION, Config, WindowManager, XcbConnection, XcbDraw};

fn run() -> Result<bool> {
    let config = Config::default();
    zwm::signals::install()?;

    let conn = XcbConnection::new()?;
    conn.register_wm()?;
    let drw = XcbDraw::new(conn.raw_conn(), &config.fonts, &config.colors)?;

    let mut wm = WindowManager::new(&conn, Box::new(drw), config)?;
    wm.scan();
    let result = wm.run();
    wm.cleanup();
    result?;

    Ok(wm.restart_requested())
}

fn main() {
    let args: Vec<String> = env::args().collect();
    match args.get(1).map(String::as_str) {
        None => (),
        Some("-v") if args.len() == 2 => {
            eprintln!("zwm-{}", VERSION);
            process::exit(1);
        }
        Some(_) => {
            eprintln!("usage: zwm [-v]");
            process::exit(1);
        }
    }

    let level = match env::var("ZWM_DEBUG") {
        Ok(v) if !v.is_empty() => LevelFilter::Debug,
        _ => LevelFilter::Info,
    };
    if let Err(e) = SimpleLogger::init(level, simplelog::Config::default()) {
        eprintln!("zwm: cannot initialise logging: {}", e);
    }

    match run() {
        Ok(true) => {
            let program = env::current_exe()
                .map(|p| p.into_os_string())
                .unwrap_or_else(|_| args.first().map_or("zwm", String::as_str).into());
            let err = process::Command::new(program).exec();
            eprintln!("zwm: cannot restart: {}", err);
            process::exit(1);
        }
        Ok(false) => (),
        Err(e) => {
            eprintln!("zwm: {:#}", e);
            process::exit(1);
        }
    }
}
