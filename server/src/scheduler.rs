//! The world loop: the only place the world is ever mutated.
//!
//! The scheduler owns the [`World`], the account table and the receiving end
//! of the action inbox. It waits on two event sources:
//!
//! - a new action arrives: it is appended to the pending batch and nothing
//!   else happens;
//! - the tick timer fires: the whole batch is applied in arrival order, then
//!   every character's behaviour state runs once with the fixed tick length.
//!
//! Actions that arrive while a batch is being applied wait for the next tick.
//! A failing action is logged and skipped; the rest of the batch still runs.
//!
//! The pending batch can be capped with [`Scheduler::with_batch_limit`]. Once
//! it is full the scheduler stops reading the inbox until the next tick, so
//! the bounded inbox fills up and submitting sessions have to wait.

use log::{debug, info, warn};
use std::mem;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

use crate::accounts::AccountManager;
use crate::actions::{Action, ActionError, ActionKind};
use crate::mailbox::Reply;
use crate::world::World;

/// What happened during one tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub executed: usize,
    pub failed: usize,
}

/// Single owner of the world, the accounts and the action inbox.
pub struct Scheduler {
    world: World,
    accounts: AccountManager,
    tick_duration: Duration,
    inbox: mpsc::Receiver<Action>,
    pending: Vec<Action>,
    batch_limit: usize,
    tick: u64,
}

impl Scheduler {
    pub fn new(
        world: World,
        accounts: AccountManager,
        tick_duration: Duration,
        inbox: mpsc::Receiver<Action>,
    ) -> Self {
        Self {
            world,
            accounts,
            tick_duration,
            inbox,
            pending: Vec::new(),
            batch_limit: usize::MAX,
            tick: 0,
        }
    }

    /// Caps how many actions wait for one tick. Further actions stay in the
    /// inbox until the batch has been applied.
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit.max(1);
        self
    }

    fn batch_full(&self) -> bool {
        self.pending.len() >= self.batch_limit
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn accounts(&self) -> &AccountManager {
        &self.accounts
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Actions waiting for the next tick.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Queues an action for the next tick.
    pub fn enqueue(&mut self, action: Action) {
        self.pending.push(action);
    }

    /// Applies the pending batch in arrival order, then advances every
    /// character's behaviour state by one tick.
    pub fn run_tick(&mut self) -> TickReport {
        let batch = mem::take(&mut self.pending);
        let mut report = TickReport::default();

        for action in batch {
            match self.apply(action) {
                Ok(()) => report.executed += 1,
                Err(_) => report.failed += 1,
            }
        }

        self.world.tick_characters(self.tick_duration);
        self.tick += 1;

        report
    }

    /// Runs one action and delivers its reply. The reply goes through the
    /// handles that were registered before the action ran, so a disconnect
    /// still gets its acknowledgement after the account is gone.
    fn apply(&mut self, action: Action) -> Result<(), ActionError> {
        let session = action.session;
        let name = action.kind.name();
        let outbox = match &action.kind {
            ActionKind::Joined(outbox) => Some(outbox.clone()),
            _ => self.accounts.outbox(session),
        };

        match action.execute(&mut self.world, &mut self.accounts) {
            Ok(reply) => {
                match outbox {
                    Some(outbox) => outbox.reply(reply),
                    None => debug!("No session {} to reply to ({})", session, name),
                }
                Ok(())
            }
            Err(e) => {
                warn!("Action '{}' from session {} failed: {}", name, session, e);
                if let Some(outbox) = outbox {
                    outbox.reply(Reply::text(format!("Something went wrong: {}", e)));
                }
                Err(e)
            }
        }
    }

    /// Event loop. Returns once every sender of the inbox is gone, after
    /// flushing whatever was still pending.
    pub async fn run(mut self) {
        let mut ticker = interval(self.tick_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Skip the first tick since it fires immediately
        ticker.tick().await;

        info!("World loop started ({:?} per tick)", self.tick_duration);

        loop {
            tokio::select! {
                action = self.inbox.recv(), if !self.batch_full() => {
                    match action {
                        Some(action) => self.enqueue(action),
                        None => {
                            info!("Action inbox closed, flushing {} pending actions", self.pending.len());
                            self.run_tick();
                            break;
                        }
                    }
                },

                _ = ticker.tick() => {
                    let report = self.run_tick();

                    if report.failed > 0 {
                        warn!("Tick {}: {} of {} actions failed",
                              self.tick, report.failed, report.executed + report.failed);
                    }

                    // Periodic monitoring
                    if self.tick % 60 == 0 && !self.accounts.is_empty() {
                        debug!("Tick {}: {} sessions, {} in world",
                               self.tick, self.accounts.len(), self.accounts.in_world());
                    }
                },
            }
        }

        info!("World loop stopped after {} ticks", self.tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::{self, Inbox};
    use crate::world::{basic_map, Coordinate};
    use tokio_test::assert_ok;

    const STEP: Duration = Duration::from_secs(1);

    fn scheduler() -> (Scheduler, mpsc::Sender<Action>) {
        let (tx, rx) = mpsc::channel(64);
        let scheduler = Scheduler::new(World::new(basic_map()), AccountManager::new(16), STEP, rx);
        (scheduler, tx)
    }

    fn replies(inbox: &mut Inbox) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(reply) = inbox.reply.try_recv() {
            out.push(reply.message().to_string());
        }
        out
    }

    fn broadcasts(inbox: &mut Inbox) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(message) = inbox.broadcast.try_recv() {
            out.push(message);
        }
        out
    }

    fn say(id: u32, text: &str) -> Action {
        Action::new(id, ActionKind::Say(text.to_string()))
    }

    /// Joins and names a character, taking two ticks.
    fn login(s: &mut Scheduler, id: u32, name: &str) -> Inbox {
        let (outbox, mut inbox) = mailbox::channel(id);
        s.enqueue(Action::joined(id, outbox));
        s.run_tick();
        s.enqueue(Action::new(id, ActionKind::Name(name.to_string())));
        s.run_tick();
        assert_eq!(replies(&mut inbox).len(), 2);
        inbox
    }

    #[test]
    fn test_actions_wait_for_tick() {
        let (mut s, _tx) = scheduler();
        let (outbox, mut inbox) = mailbox::channel(1);

        s.enqueue(Action::joined(1, outbox));
        assert_eq!(s.pending(), 1);
        assert!(s.accounts().is_empty());
        assert!(replies(&mut inbox).is_empty());

        let report = s.run_tick();
        assert_eq!(report, TickReport { executed: 1, failed: 0 });
        assert_eq!(s.pending(), 0);
        assert_eq!(s.accounts().len(), 1);
        assert_eq!(replies(&mut inbox).len(), 1);
        assert_eq!(s.tick(), 1);
    }

    #[test]
    fn test_batch_runs_in_arrival_order() {
        let (mut s, _tx) = scheduler();
        let mut abel = login(&mut s, 1, "abel");
        let mut bella = login(&mut s, 2, "bella");
        broadcasts(&mut abel);

        s.enqueue(say(1, "one"));
        s.enqueue(say(2, "two"));
        s.enqueue(say(1, "three"));
        s.run_tick();

        assert_eq!(replies(&mut abel), vec!["You said one", "You said three"]);
        assert_eq!(replies(&mut bella), vec!["You said two"]);
        assert_eq!(broadcasts(&mut bella), vec!["abel said one", "abel said three"]);
        assert_eq!(broadcasts(&mut abel), vec!["bella said two"]);
    }

    #[test]
    fn test_failed_action_does_not_stop_batch() {
        let (mut s, _tx) = scheduler();
        let mut abel = login(&mut s, 1, "abel");
        let (outbox, mut guest) = mailbox::channel(2);
        s.enqueue(Action::joined(2, outbox));
        s.run_tick();
        replies(&mut guest);

        s.enqueue(say(1, "before"));
        s.enqueue(say(2, "no character yet"));
        s.enqueue(say(99, "nobody"));
        s.enqueue(say(1, "after"));
        let report = s.run_tick();

        assert_eq!(report, TickReport { executed: 2, failed: 2 });
        assert_eq!(replies(&mut abel), vec!["You said before", "You said after"]);
        assert_eq!(
            replies(&mut guest),
            vec!["Something went wrong: session 2 has no character (action: say)"]
        );
    }

    #[test]
    fn test_state_machine_runs_after_batch() {
        let (mut s, _tx) = scheduler();
        let mut abel = login(&mut s, 1, "abel");
        let mut bella = login(&mut s, 2, "bella");
        broadcasts(&mut abel);

        s.enqueue(Action::new(1, ActionKind::Smoke("start".into())));
        s.run_tick();
        assert_eq!(replies(&mut abel), vec!["You started to smoke your pipe"]);
        // the new state already ticked once in the same tick
        assert_eq!(broadcasts(&mut abel), vec!["The pipe puffs"]);
        assert_eq!(
            broadcasts(&mut bella),
            vec!["abel started to smoke a pipe", "abel puffs the pipe"]
        );

        for _ in 0..3 {
            s.run_tick();
        }
        assert_eq!(broadcasts(&mut abel).len(), 3);

        s.run_tick();
        assert_eq!(
            broadcasts(&mut abel),
            vec!["You run out of tobacco and stopped smoking the pipe"]
        );
        assert_eq!(
            broadcasts(&mut bella).last().map(String::as_str),
            Some("abel stopped smoking the pipe")
        );

        s.run_tick();
        s.run_tick();
        assert!(broadcasts(&mut abel).is_empty());
        assert!(broadcasts(&mut bella).is_empty());
    }

    #[test]
    fn test_disconnect_acknowledges_then_closes_channels() {
        let (mut s, _tx) = scheduler();
        let mut abel = login(&mut s, 1, "abel");

        s.enqueue(Action::disconnecting(1));
        s.run_tick();

        assert_eq!(abel.reply.try_recv().unwrap(), Reply::text("Goodbye!"));
        assert_eq!(
            abel.reply.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        );
        assert_eq!(
            abel.broadcast.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        );
        assert!(s.world().character(1).is_none());
        assert!(s.world().occupants(Coordinate::new(0, 0)).is_empty());
    }

    #[test]
    fn test_action_after_disconnect_is_dropped() {
        let (mut s, _tx) = scheduler();
        let _abel = login(&mut s, 1, "abel");

        s.enqueue(Action::disconnecting(1));
        s.enqueue(say(1, "too late"));
        let report = s.run_tick();

        assert_eq!(report, TickReport { executed: 1, failed: 1 });
    }

    #[tokio::test]
    async fn test_run_defers_until_timer() {
        let (tx, rx) = mpsc::channel(8);
        let scheduler = Scheduler::new(
            World::new(basic_map()),
            AccountManager::new(4),
            Duration::from_millis(200),
            rx,
        );
        let handle = tokio::spawn(scheduler.run());

        let (outbox, mut inbox) = mailbox::channel(1);
        assert_ok!(tx.send(Action::joined(1, outbox)).await);

        // nothing is applied between ticks
        assert!(inbox.reply.try_recv().is_err());

        let reply = inbox.reply.recv().await.unwrap();
        assert!(matches!(reply, Reply::Text(ref t) if t.starts_with("Welcome!")));

        drop(tx);
        assert_ok!(handle.await);
    }

    #[tokio::test]
    async fn test_full_batch_pushes_back_on_senders() {
        let (tx, rx) = mpsc::channel(1);
        let scheduler = Scheduler::new(
            World::new(basic_map()),
            AccountManager::new(8),
            Duration::from_secs(3600),
            rx,
        )
        .with_batch_limit(2);
        tokio::spawn(scheduler.run());

        let mut inboxes = Vec::new();
        for id in 1..=3 {
            let (outbox, inbox) = mailbox::channel(id);
            assert_ok!(tx.send(Action::joined(id, outbox)).await);
            inboxes.push(inbox);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        // two actions are batched, one waits in the inbox, the inbox is full
        let (outbox, _inbox) = mailbox::channel(4);
        assert!(matches!(
            tx.try_send(Action::joined(4, outbox)),
            Err(mpsc::error::TrySendError::Full(_))
        ));
        assert!(inboxes.iter_mut().all(|inbox| inbox.reply.try_recv().is_err()));
    }

    #[test]
    fn test_batch_limit_is_at_least_one() {
        let (s, _tx) = scheduler();
        let s = s.with_batch_limit(0);
        assert!(!s.batch_full());
    }

    #[tokio::test]
    async fn test_closing_inbox_flushes_pending() {
        let (tx, rx) = mpsc::channel(8);
        let scheduler = Scheduler::new(
            World::new(basic_map()),
            AccountManager::new(4),
            Duration::from_secs(3600),
            rx,
        );
        let handle = tokio::spawn(scheduler.run());

        let (outbox, mut inbox) = mailbox::channel(1);
        assert_ok!(tx.send(Action::joined(1, outbox)).await);
        drop(tx);

        assert_ok!(handle.await);
        assert!(inbox.reply.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_every_action_gets_exactly_one_reply() {
        const SESSIONS: u32 = 8;
        const ACTIONS: usize = 25;

        let (tx, rx) = mpsc::channel(16);
        let scheduler = Scheduler::new(
            World::new(basic_map()),
            AccountManager::new(SESSIONS as usize),
            Duration::from_millis(5),
            rx,
        );
        let world_loop = tokio::spawn(scheduler.run());

        let mut sessions = Vec::new();
        for id in 1..=SESSIONS {
            let tx = tx.clone();
            sessions.push(tokio::spawn(async move {
                let (outbox, mut inbox) = mailbox::channel(id);
                tx.send(Action::joined(id, outbox)).await.unwrap();
                inbox.reply.recv().await.unwrap();
                tx.send(Action::new(id, ActionKind::Name(format!("player{}", id))))
                    .await
                    .unwrap();
                inbox.reply.recv().await.unwrap();

                let mut received = 0;
                for i in 0..ACTIONS {
                    let kind = match i % 4 {
                        0 => ActionKind::Say(format!("message {}", i)),
                        1 => ActionKind::Go("east".to_string()),
                        2 => ActionKind::Go("west".to_string()),
                        _ => ActionKind::Unknown("dance".to_string()),
                    };
                    tx.send(Action::new(id, kind)).await.unwrap();
                    if inbox.reply.recv().await.is_some() {
                        received += 1;
                    }
                }

                tx.send(Action::disconnecting(id)).await.unwrap();
                assert_eq!(inbox.reply.recv().await, Some(Reply::text("Goodbye!")));
                // channels are closed after the acknowledgement
                assert_eq!(inbox.reply.recv().await, None);
                received
            }));
        }
        drop(tx);

        let mut total = 0;
        for session in sessions {
            total += session.await.unwrap();
        }
        assert_eq!(total, SESSIONS as usize * ACTIONS);

        assert_ok!(world_loop.await);
    }
}
