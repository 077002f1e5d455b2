//! Scripted signaling peer
//!
//! Run with: cargo run --example chat_peer -- [URL] [SESSION]
//!
//! Start two of these against a running relay_server. The first to join
//! sends a (fake) offer and candidates; the second answers. Every message
//! received is printed, so the exchange an actual WebRTC peer would see is
//! visible end to end.

use std::time::Duration;

use signal_relay::{SignalMessage, SignalingClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let url = args
        .first()
        .cloned()
        .unwrap_or_else(|| "ws://127.0.0.1:9001".to_string());
    let session = args.get(1).cloned().unwrap_or_else(|| "demo".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("signal_relay=info".parse()?),
        )
        .init();

    let mut client = SignalingClient::connect_ws(&url).await?;
    let peer_id = client.join(&session).await?;
    println!("Joined '{}' as peer {}", session, peer_id);

    loop {
        let message = tokio::select! {
            message = client.recv() => message?,
            _ = tokio::signal::ctrl_c() => break,
        };

        let Some(message) = message else {
            println!("Relay closed the connection");
            break;
        };

        println!("<- {:?}", message);

        match message {
            // Newcomer: play the offering side
            SignalMessage::PeerJoined { .. } => {
                let sdp = format!("v=0\r\no=- {} 1 IN IP4 127.0.0.1\r\n", peer_id);
                client.send(&SignalMessage::offer(&session, sdp)).await?;
                for i in 0..3 {
                    let candidate = format!("candidate:{} 1 udp 2122260223 127.0.0.1 {} typ host", i, 50000 + i);
                    client
                        .send(&SignalMessage::ice_candidate(&session, candidate))
                        .await?;
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                client
                    .send(&SignalMessage::EndOfCandidates {
                        session: session.clone(),
                    })
                    .await?;
            }
            SignalMessage::Offer { .. } => {
                let sdp = format!("v=0\r\no=- {} 2 IN IP4 127.0.0.1\r\n", peer_id);
                client.send(&SignalMessage::answer(&session, sdp)).await?;
            }
            _ => {}
        }
    }

    client.leave(&session).await?;
    client.close().await?;
    Ok(())
}
