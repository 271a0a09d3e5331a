//! Tests for full-housie detection, prize ranks and end-to-end games.

use housie_engine::invariants::{GameInvariants, InvariantSet};
use housie_engine::testing::EngineHarness;
use housie_engine::{
    Actor, EngineConfig, GameEndReason, GameState, GameStatus, HIGHEST_NUMBER, LOWEST_NUMBER,
    TicketId, TiePolicy, TimerPurpose,
};
use std::collections::HashSet;

fn id(raw: &str) -> TicketId {
    TicketId::from(raw)
}

fn numbers_of(state: &GameState, ticket_id: &TicketId) -> Vec<u8> {
    state
        .ticket(ticket_id)
        .expect("ticket exists")
        .numbers()
        .collect()
}

/// Numbers in 1-90 that are on none of the given tickets.
fn unused_numbers(state: &GameState, ticket_ids: &[TicketId], count: usize) -> Vec<u8> {
    let used: HashSet<u8> = ticket_ids
        .iter()
        .flat_map(|ticket_id| numbers_of(state, ticket_id))
        .collect();
    (LOWEST_NUMBER..=HIGHEST_NUMBER)
        .filter(|n| !used.contains(n))
        .take(count)
        .collect()
}

fn to_sequence(numbers: &[u8]) -> Vec<i64> {
    numbers.iter().map(|&n| i64::from(n)).collect()
}

/// Two tickets that share at least one number, plus one shared number.
fn shared_pair(state: &GameState) -> (TicketId, TicketId, u8) {
    let tickets = state.tickets();
    for (i, a) in tickets.iter().enumerate() {
        let a_numbers: HashSet<u8> = a.numbers().collect();
        for b in &tickets[i + 1..] {
            if let Some(shared) = b.numbers().find(|n| a_numbers.contains(n)) {
                return (a.id().clone(), b.id().clone(), shared);
            }
        }
    }
    panic!("20 tickets of 15 numbers from 90 must overlap");
}

/// Books both tickets of a shared pair and orders the draw so that both
/// complete on the same call.
fn simultaneous_finish(config: EngineConfig) -> (EngineHarness, TicketId, TicketId) {
    let mut h = EngineHarness::new(config.with_ticket_seed(31));
    let host = Actor::host();
    h.engine.create_game(host, 20).expect("create");

    let (first, second, shared) = shared_pair(h.engine.state());
    h.engine.book_ticket(host, &first, "First").expect("book");
    h.engine.book_ticket(host, &second, "Second").expect("book");

    let mut sequence: Vec<u8> = Vec::new();
    for number in numbers_of(h.engine.state(), &first)
        .into_iter()
        .chain(numbers_of(h.engine.state(), &second))
    {
        if number != shared && !sequence.contains(&number) {
            sequence.push(number);
        }
    }
    sequence.push(shared);
    sequence.extend(unused_numbers(h.engine.state(), &[first.clone(), second.clone()], 3));

    h.engine
        .set_draw_sequence(host, to_sequence(&sequence))
        .expect("sequence");
    h.engine.start_countdown(host, 5).expect("countdown");
    (h, first, second)
}

#[test]
fn test_full_housie_end_to_end() {
    let mut h = EngineHarness::new(
        EngineConfig::default()
            .with_ticket_seed(2024)
            .with_max_prize_ranks(1),
    );
    let host = Actor::host();
    let t1 = id("T-01");

    h.engine.create_game(host, 3).expect("create");
    h.engine.book_ticket(Actor::player(), &t1, "Asha").expect("book");

    let mut sequence = numbers_of(h.engine.state(), &t1);
    sequence.reverse();
    sequence.extend(unused_numbers(h.engine.state(), &[t1.clone()], 5));
    h.engine
        .set_draw_sequence(host, to_sequence(&sequence))
        .expect("sequence");
    h.engine.start_countdown(host, 5).expect("countdown");

    assert!(h.fire(TimerPurpose::CountdownExpiry));
    for _ in 0..14 {
        assert!(h.fire(TimerPurpose::NextDraw));
    }
    assert!(!*h.engine.state().ticket(&t1).expect("ticket").is_winner());

    assert!(h.fire(TimerPurpose::NextDraw));

    let state = h.engine.state();
    let ticket = state.ticket(&t1).expect("ticket");
    assert!(*ticket.is_winner());
    assert_eq!(*ticket.prize_rank(), Some(1));
    assert_eq!(ticket.called_numbers_snapshot_at_win().as_ref().map(Vec::len), Some(15));
    assert!(ticket.win_timestamp().is_some());
    assert_eq!(*state.status(), GameStatus::Completed);
    assert_eq!(*state.game_end_reason(), Some(GameEndReason::FullHousieComplete));
    assert_eq!(state.called_numbers().len(), 15);
    assert_eq!(h.timers.pending_count(), 0);
    assert!(GameInvariants::check_all(state).is_ok());

    let winners = h.events.winners();
    assert_eq!(winners.len(), 1);
    assert_eq!(*winners[0].rank(), 1);
    assert_eq!(winners[0].ticket_id(), &t1);
    assert_eq!(winners[0].player_name(), "Asha");

    let ends = h.events.game_ends();
    assert_eq!(ends.len(), 1);
    assert_eq!(*ends[0].reason(), GameEndReason::FullHousieComplete);
    assert_eq!(ends[0].winners().len(), 1);
    assert_eq!(*ends[0].final_called_count(), 15);
}

#[test]
fn test_remaining_ranks_keep_game_running() {
    let mut h = EngineHarness::new(EngineConfig::default().with_ticket_seed(2024));
    let host = Actor::host();
    let t1 = id("T-01");

    h.engine.create_game(host, 3).expect("create");
    h.engine.book_ticket(Actor::player(), &t1, "Asha").expect("book");
    let mut sequence = numbers_of(h.engine.state(), &t1);
    sequence.extend(unused_numbers(h.engine.state(), &[t1.clone()], 5));
    h.engine
        .set_draw_sequence(host, to_sequence(&sequence))
        .expect("sequence");
    h.engine.start_countdown(host, 5).expect("countdown");

    h.run_until_idle(100);

    let state = h.engine.state();
    assert_eq!(state.prize_rank_of(&t1), Some(1));
    assert_eq!(state.called_numbers().len(), 20);
    assert_eq!(*state.game_end_reason(), Some(GameEndReason::SequenceComplete));
}

#[test]
fn test_unbooked_tickets_never_win() {
    let mut h = EngineHarness::new(EngineConfig::default().with_ticket_seed(8));
    let host = Actor::host();
    h.engine.create_game(host, 3).expect("create");
    h.engine
        .book_ticket(host, &id("T-03"), "Only booking")
        .expect("book");
    h.engine
        .set_draw_sequence(host, (1..=90).collect::<Vec<i64>>())
        .expect("sequence");
    h.engine.start_countdown(host, 5).expect("countdown");

    h.run_until_idle(200);

    let state = h.engine.state();
    assert_eq!(*state.status(), GameStatus::Completed);
    assert_eq!(state.winners().len(), 1);
    assert_eq!(state.winners()[0].ticket_id(), &id("T-03"));
    assert!(!*state.ticket(&id("T-01")).expect("ticket").is_winner());
    assert!(!*state.ticket(&id("T-02")).expect("ticket").is_winner());
}

#[test]
fn test_winner_iff_all_numbers_called() {
    let mut h = EngineHarness::new(EngineConfig::default().with_ticket_seed(64));
    let host = Actor::host();
    h.engine.create_game(host, 6).expect("create");
    for n in 1..=6 {
        h.engine
            .book_ticket(host, &TicketId::from_ordinal(n), &format!("P{n}"))
            .expect("book");
    }
    h.engine
        .set_draw_sequence(host, (1..=90).rev().collect::<Vec<i64>>())
        .expect("sequence");
    h.engine.start_countdown(host, 5).expect("countdown");
    h.fire(TimerPurpose::CountdownExpiry);

    while h.fire(TimerPurpose::NextDraw) {
        let state = h.engine.state();
        let called: HashSet<u8> = state.called_numbers().iter().copied().collect();
        for ticket in state.tickets() {
            let complete = ticket.is_covered_by(&called);
            let awarded = *ticket.is_winner();
            if awarded {
                assert!(complete, "{} won before completing", ticket.id());
            } else if complete {
                assert!(
                    state.ranks_exhausted(),
                    "{} complete but not awarded",
                    ticket.id()
                );
            }
        }
    }
}

#[test]
fn test_shared_rank_policy_end_to_end() {
    let (mut h, first, second) = simultaneous_finish(EngineConfig::default());
    h.run_until_idle(100);

    let state = h.engine.state();
    assert_eq!(state.prize_rank_of(&first), Some(1));
    assert_eq!(state.prize_rank_of(&second), Some(1));
    assert_eq!(*state.current_prize_rank(), 1);
    assert_eq!(*state.game_end_reason(), Some(GameEndReason::SequenceComplete));

    let winners = h.events.winners();
    assert_eq!(winners.len(), 2);
    assert_eq!(winners[0].called_numbers_snapshot(), winners[1].called_numbers_snapshot());
}

#[test]
fn test_shared_rank_fills_last_rank_for_everyone() {
    let (mut h, first, second) =
        simultaneous_finish(EngineConfig::default().with_max_prize_ranks(1));
    h.run_until_idle(100);

    let state = h.engine.state();
    assert_eq!(state.prize_rank_of(&first), Some(1));
    assert_eq!(state.prize_rank_of(&second), Some(1));
    assert_eq!(*state.game_end_reason(), Some(GameEndReason::FullHousieComplete));
}

#[test]
fn test_sequential_rank_policy_end_to_end() {
    let (mut h, first, second) = simultaneous_finish(
        EngineConfig::default().with_tie_policy(TiePolicy::SequentialPerTicket),
    );
    h.run_until_idle(100);

    let state = h.engine.state();
    assert_eq!(state.prize_rank_of(&first), Some(1));
    assert_eq!(state.prize_rank_of(&second), Some(2));
    assert_eq!(*state.current_prize_rank(), 2);
    let ranks: Vec<u32> = state.winners().iter().map(|w| *w.prize_rank()).collect();
    assert_eq!(ranks, vec![1, 2]);
}

#[test]
fn test_sequential_policy_stops_at_last_rank() {
    let (mut h, first, second) = simultaneous_finish(
        EngineConfig::default()
            .with_tie_policy(TiePolicy::SequentialPerTicket)
            .with_max_prize_ranks(1),
    );
    h.run_until_idle(100);

    let state = h.engine.state();
    assert_eq!(state.prize_rank_of(&first), Some(1));
    assert_eq!(state.prize_rank_of(&second), None);
    assert_eq!(*state.game_end_reason(), Some(GameEndReason::FullHousieComplete));
    assert_eq!(h.events.winners().len(), 1);
}
