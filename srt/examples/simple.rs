use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use clap::Parser;
use srt::{Acceptor, Socket, SrtOptions};
use tokio::{
    sync::Mutex,
    time::{sleep, Instant},
};

#[derive(Parser, Clone)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION"),
)]
struct Args {
    #[arg(long)]
    addr: SocketAddr,
    #[arg(long)]
    kind: String,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    srt::startup();
    let _ = srt::init_logging(log::LevelFilter::Info, None);

    let mut index: u8 = 0;
    let args = Args::parse();
    let tables: Arc<Mutex<HashMap<u8, Instant>>> = Arc::new(Mutex::new(HashMap::new()));

    let mut options = SrtOptions::new();
    options.set_str("latency", "20")?;
    options.set_str("fc", "32")?;

    if args.kind == "server" {
        let acceptor = Acceptor::bind(args.addr, options, 100).await?;
        loop {
            let (socket, peer) = acceptor.accept(None, None).await?;
            log::info!("accepted connection from {peer}");

            tokio::spawn(async move {
                let mut buf = [0u8; 2000];
                loop {
                    let size = match socket.recv(&mut buf, None, None).await {
                        Ok(size) => size,
                        Err(err) => {
                            log::warn!("connection from {peer} ended: {err}");
                            break;
                        }
                    };

                    if let Err(err) = socket.send(&buf[..size], None, None).await {
                        log::warn!("send to {peer} failed: {err}");
                        break;
                    }
                }
            });
        }
    } else {
        let socket = Arc::new(Socket::connect(args.addr, options, None, None, None).await?);

        let tables_ = tables.clone();
        let socket_ = socket.clone();
        tokio::spawn(async move {
            let mut buf = [0u8; 2000];
            loop {
                let size = match socket_.recv(&mut buf, None, None).await {
                    Ok(size) => size,
                    Err(err) => {
                        log::warn!("connection ended: {err}");
                        break;
                    }
                };

                let index = buf[0];
                if let Some(instant) = tables_.lock().await.remove(&index) {
                    println!(
                        "delay={}ms, stats={:#?}",
                        instant.elapsed().as_millis() / 2,
                        socket_.get_stats()
                    );
                }
            }
        });

        let mut buf = [0u8; 1300];
        loop {
            buf[0] = index;
            tables.lock().await.insert(index, Instant::now());
            index = if index == u8::MAX { 0 } else { index + 1 };

            socket.send(&buf, None, None).await?;
            sleep(Duration::from_millis(1000)).await;
        }
    }
}
