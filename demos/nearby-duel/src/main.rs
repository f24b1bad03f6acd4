//! Two players side by side: a framed-link lobby, a challenge, and a
//! scripted game of tic-tac-toe over the same link.
//!
//! Run with `RUST_LOG=debug` to watch the wire traffic.

use std::time::Duration;

use peerboard::game::pgn::{build_pgn, PgnHeaders};
use peerboard::lobby::LobbyEvent;
use peerboard::prelude::*;
use peerboard::room::framed::{LINK_MAX_CHUNK, SERVICE_ID};
use tokio::sync::mpsc;

type DemoResult<T> = Result<T, Box<dyn std::error::Error>>;

const WAIT: Duration = Duration::from_secs(5);

/// Al plays X (white), Bea plays O (black). X completes the bottom rank.
const SCRIPT: [&str; 5] = ["a1", "b2", "b1", "a3", "c1"];

async fn next_lobby_event<F>(
    rx: &mut mpsc::UnboundedReceiver<LobbyEvent>,
    mut pred: F,
) -> DemoResult<LobbyEvent>
where
    F: FnMut(&LobbyEvent) -> bool,
{
    let found = tokio::time::timeout(WAIT, async {
        while let Some(ev) = rx.recv().await {
            if pred(&ev) {
                return Some(ev);
            }
        }
        None
    })
    .await?;
    found.ok_or_else(|| "lobby closed".into())
}

async fn wait_view<F>(game: &MatchSession, pred: F) -> DemoResult<MatchView>
where
    F: FnMut(&MatchView) -> bool,
{
    let mut rx = game.watch();
    let view = tokio::time::timeout(WAIT, rx.wait_for(pred)).await??;
    Ok(view.clone())
}

#[tokio::main]
async fn main() -> DemoResult<()> {
    init_tracing();

    // One radio link between the two phones.
    let (al_end, bea_end) = memory_link_pair(LINK_MAX_CHUNK);
    let al_radio = MemoryDiscovery::new();
    al_radio.advertise(SERVICE_ID, al_end);
    let bea_radio = MemoryDiscovery::new();
    bea_radio.advertise(SERVICE_ID, bea_end);

    let hub = MemoryRendezvous::new();
    let mut al = NodeBuilder::new().name("Al").rating(1320).build(hub.endpoint());
    let mut bea = NodeBuilder::new().name("Bea").rating(1280).build(hub.endpoint());

    let (al_lobby, mut al_events) = al.open_nearby_lobby(&al_radio).await?;
    let (bea_lobby, mut bea_events) = bea.open_nearby_lobby(&bea_radio).await?;

    let LobbyEvent::PeerUpdated(bea_peer) =
        next_lobby_event(&mut al_events, |e| matches!(e, LobbyEvent::PeerUpdated(_))).await?
    else {
        return Err("unexpected lobby event".into());
    };
    tracing::info!(name = %bea_peer.name, rating = bea_peer.rating, "Al sees a nearby player");

    al_lobby.challenge(bea_peer.id.clone(), Color::White).await?;
    next_lobby_event(&mut bea_events, |e| matches!(e, LobbyEvent::ChallengeReceived(_))).await?;
    let bea_ticket = bea_lobby.accept().await?;
    let LobbyEvent::Matched(al_ticket) =
        next_lobby_event(&mut al_events, |e| matches!(e, LobbyEvent::Matched(_))).await?
    else {
        return Err("unexpected lobby event".into());
    };

    let (al_game, _) = al.start_match(&al_ticket, TicTacToe).await?;
    let (bea_game, _) = bea.start_match(&bea_ticket, TicTacToe).await?;
    wait_view(&al_game, |v| v.black.is_some()).await?;
    wait_view(&bea_game, |v| v.white.is_some()).await?;

    for (i, square) in SCRIPT.iter().enumerate() {
        let (mover, other) = if i % 2 == 0 {
            (&al_game, &bea_game)
        } else {
            (&bea_game, &al_game)
        };
        let entry = mover.play(MoveRequest::place(*square)).await?;
        tracing::info!(seq = entry.seq, square, "move played");
        wait_view(other, |v| v.log_len as u64 == entry.seq).await?;

        // Bea tries for a draw after the opening; Al is having none of it.
        if i == 1 {
            bea_game.offer_draw().await?;
            wait_view(&al_game, |v| v.draw_offer.is_some()).await?;
            al_game.decline_draw().await?;
            wait_view(&bea_game, |v| v.draw_offer.is_none()).await?;
        }
    }

    let view = wait_view(&bea_game, |v| v.result.is_over()).await?;
    let headers = PgnHeaders {
        white: "Al".into(),
        black: "Bea".into(),
        ..PgnHeaders::default()
    };
    println!("{}", build_pgn(&headers, &view.moves, &view.result));

    let al_store = MemoryRatingStore::new();
    let bea_store = MemoryRatingStore::new();
    for (node_name, profile) in [
        (
            "Al",
            al.record_result(&al_store, &al_game.view(), al_ticket.opponent_rating)
                .await?,
        ),
        (
            "Bea",
            bea.record_result(&bea_store, &view, bea_ticket.opponent_rating)
                .await?,
        ),
    ] {
        if let Some(profile) = profile {
            println!("{node_name}: {}", profile.record.rating);
        }
    }

    al.shutdown().await;
    bea.shutdown().await;
    Ok(())
}
