use std::net::IpAddr;

use anyhow::Context;
use peer::{Identity, MessageFeed, PeerAgent, PeerConfig};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, PartialEq)]
enum Command<'a> {
    Join(&'a str),
    Create(&'a str),
    Quit,
    Refresh,
    List,
    Me,
    Direct { ip: IpAddr, port: u16, text: &'a str },
    Exit,
    Broadcast(&'a str),
}

fn parse_command(line: &str) -> Result<Command<'_>, String> {
    let line = line.trim();
    if !line.starts_with('/') {
        return Ok(Command::Broadcast(line));
    }

    let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let need_arg = |arg: &'static str| {
        if rest.is_empty() {
            Err(format!("usage: {} <{}>", cmd, arg))
        } else {
            Ok(rest)
        }
    };

    match cmd {
        "/join" => need_arg("channel").map(Command::Join),
        "/create" => need_arg("channel").map(Command::Create),
        "/quit" => Ok(Command::Quit),
        "/refresh" => Ok(Command::Refresh),
        "/list" => Ok(Command::List),
        "/me" => Ok(Command::Me),
        "/exit" => Ok(Command::Exit),
        "/dm" => {
            let mut parts = rest.splitn(3, ' ');
            let (Some(ip), Some(port), Some(text)) = (parts.next(), parts.next(), parts.next())
            else {
                return Err("usage: /dm <ip> <port> <text>".to_string());
            };
            Ok(Command::Direct {
                ip: ip.parse().map_err(|_| format!("invalid ip {}", ip))?,
                port: port.parse().map_err(|_| format!("invalid port {}", port))?,
                text,
            })
        }
        other => Err(format!("unknown command {}", other)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenvy::dotenv().is_err() {
        dotenvy::from_filename("peer/.env").ok();
    }

    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = PeerConfig::from_env().context("failed to load peer configuration")?;
    let identity = Identity::from_env()
        .context("PEER_USERNAME, PEER_PASSWORD and PEER_PORT are required")?;
    log::info!("Directory server at {}", config.api_url);

    let (feed, mut lines) = MessageFeed::channel();
    let agent = PeerAgent::new(config, feed.clone())?;

    let printer = tokio::spawn(async move {
        while let Some(line) = lines.recv().await {
            println!("{}", line);
        }
    });

    agent
        .login_and_register(&identity.username, &identity.password, identity.port)
        .await
        .context("failed to join the network")?;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = stdin.next_line() => match line.context("failed to read stdin")? {
                Some(line) => line,
                None => break,
            },
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(usage) => {
                feed.error(usage);
                continue;
            }
        };

        // The agent feeds its own errors.
        let result = match command {
            Command::Exit => break,
            Command::Join(name) => agent.join_channel(name).await,
            Command::Create(name) => agent.create_channel(name).await,
            Command::Quit => agent.quit_channel().await,
            Command::Refresh => agent
                .refresh_peers()
                .await
                .map(|count| feed.system(format!("{} members in channel", count))),
            Command::List => agent
                .channel_list()
                .await
                .map(|channels| feed.system(format!("Channels: {}", channels.join(", ")))),
            Command::Me => agent.me().await.map(|me| {
                feed.system(format!(
                    "{} registered={} channel={}",
                    me.username.unwrap_or_default(),
                    me.is_registered,
                    me.current_channel.unwrap_or_else(|| "-".to_string())
                ))
            }),
            Command::Direct { ip, port, text } => agent.send_direct(ip, port, text).await,
            Command::Broadcast(text) => agent.broadcast(text, true).await.map(|_| ()),
        };

        if let Err(err) = result {
            log::debug!("command failed: {}", err);
        }
    }

    agent.shutdown().await;
    drop(feed);
    drop(agent);
    let _ = printer.await;
    Ok(())
}
