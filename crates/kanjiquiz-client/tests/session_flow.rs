#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use kanjiquiz_client::session::{AnswerStatus, SessionEvent, SessionState};
use kanjiquiz_core::error::QuizError;
use kanjiquiz_core::protocol::payloads::{
    InReqSendAnswer, InReqVerifySignature, InRespQuestion, OutNotifAdminMade, OutNotifChatSent,
    OutNotifClientAnswered, OutNotifGameStarted, OutNotifGameStopped, OutNotifQuestion, OutNotifRoundEnded, OutReqQuestion,
    OutRespSignMessage, OutRespStatus, QuestionInfo, RoundResults, STATUS_SUCCESS,
};
use kanjiquiz_core::protocol::{Envelope, MessageType};

use common::{
    answer, client, expect_request, join, next_event, register, session, settings, wait_state,
    word, BrokenWords, FakeKeys, RecordingStats, Setup, ADDRESS,
};

fn results(answers: Vec<kanjiquiz_core::protocol::payloads::AnswerInfo>) -> RoundResults {
    RoundResults {
        question: Some(QuestionInfo {
            word_info: word("日本"),
            font_name: "NotoSansJP-Regular.ttf".into(),
        }),
        answers,
    }
}

#[tokio::test]
async fn registers_and_lands_in_lobby() {
    let (s, mut peers) = session(Setup::default());
    let mut state = s.subscribe_state();
    assert_eq!(s.state(), SessionState::Off);

    let _peer = join(&s, &mut peers, "c1", vec![client("c1", "Alice")]).await;
    wait_state(&mut state, SessionState::Lobby).await;

    let snap = s.snapshot().await;
    assert_eq!(snap.client_id.as_deref(), Some("c1"));
    assert_eq!(snap.roster.len(), 1);
    assert_eq!(snap.roster[0].name, "Alice");
    assert_eq!(snap.settings, settings());
    assert!(!s.is_admin("c1").await.unwrap());
}

#[tokio::test]
async fn signature_handshake_runs_with_key_manager() {
    let (s, mut peers) = session(Setup {
        identity: Some(Arc::new(FakeKeys)),
        ..Setup::default()
    });

    let s2 = Arc::clone(&s);
    let connecting = tokio::spawn(async move { s2.connect(ADDRESS).await });
    let mut peer = peers.recv().await.unwrap();

    let req = expect_request(&mut peer, MessageType::InReqSendPublicKey).await;
    peer.reply(&req, &OutRespSignMessage { message: "nonce-42".into() }).await.unwrap();
    let req = expect_request(&mut peer, MessageType::InReqVerifySignature).await;
    assert_eq!(
        req.payload_as::<InReqVerifySignature>().unwrap().signature,
        "pk-alice:nonce-42"
    );
    peer.reply(&req, &OutRespStatus { status: STATUS_SUCCESS.into() }).await.unwrap();
    register(&mut peer, "c1", vec![client("c1", "Alice")]).await;

    connecting.await.unwrap().unwrap();
    assert_eq!(s.state(), SessionState::Lobby);
}

#[tokio::test]
async fn rejected_registration_leaves_session_off() {
    let (s, mut peers) = session(Setup::default());
    let s2 = Arc::clone(&s);
    let connecting = tokio::spawn(async move { s2.connect(ADDRESS).await });
    let mut peer = peers.recv().await.unwrap();

    let req = expect_request(&mut peer, MessageType::InReqRegisterClient).await;
    peer.reply(&req, &OutRespStatus { status: "alreadyRegistered".into() }).await.unwrap();

    let err = connecting.await.unwrap().unwrap_err();
    assert!(matches!(err, QuizError::Status(_)), "{err}");
    assert_eq!(s.state(), SessionState::Off);
    assert!(!s.connector().is_connected().await);
}

#[tokio::test]
async fn two_rounds_rank_the_roster() {
    let (s, mut peers) = session(Setup::default());
    let mut state = s.subscribe_state();
    let mut events = s.subscribe();
    let mut peer = join(&s, &mut peers, "a", vec![client("b", "Bob"), client("a", "Alice")]).await;

    peer.notify(&OutNotifGameStarted { game_settings: settings() }).await.unwrap();
    wait_state(&mut state, SessionState::WaitingQuestion).await;

    // round 0: both correct, Alice answers locally first
    peer.notify(&OutNotifQuestion { question_svg: "<svg>1</svg>".into() }).await.unwrap();
    wait_state(&mut state, SessionState::AnswerQuestion).await;

    let s2 = Arc::clone(&s);
    let answering = tokio::spawn(async move { s2.send_answer("にほん").await });
    let req = expect_request(&mut peer, MessageType::InReqSendAnswer).await;
    assert_eq!(req.payload_as::<InReqSendAnswer>().unwrap().answer, "にほん");
    peer.reply(&req, &OutRespStatus { status: STATUS_SUCCESS.into() }).await.unwrap();
    answering.await.unwrap().unwrap();

    peer.notify(&OutNotifClientAnswered { id: "b".into() }).await.unwrap();
    next_event(&mut events, |e| match e {
        SessionEvent::ClientAnswered { id } => Some(id),
        _ => None,
    })
    .await;
    let open = s.snapshot().await;
    let round = open.rounds.last().unwrap();
    assert_eq!(round.answers["a"].answer, "にほん");
    assert_eq!(round.answers["b"].answer, "?");

    peer.notify(&OutNotifRoundEnded(results(vec![
        answer("a", "にほん", true),
        answer("b", "にっぽん", true),
    ])))
    .await
    .unwrap();
    let (round, ranking) = next_event(&mut events, |e| match e {
        SessionEvent::RoundFinalized { round, ranking } => Some((round, ranking)),
        _ => None,
    })
    .await;
    assert_eq!(round, 0);
    assert_eq!(ranking, vec!["b", "a"]);
    wait_state(&mut state, SessionState::WaitingQuestion).await;

    // round 1: only Alice is right
    peer.notify(&OutNotifQuestion { question_svg: "<svg>2</svg>".into() }).await.unwrap();
    wait_state(&mut state, SessionState::AnswerQuestion).await;
    peer.notify(&OutNotifRoundEnded(results(vec![
        answer("a", "にほん", true),
        answer("b", "やま", false),
    ])))
    .await
    .unwrap();
    let (round, ranking) = next_event(&mut events, |e| match e {
        SessionEvent::RoundFinalized { round, ranking } => Some((round, ranking)),
        _ => None,
    })
    .await;
    assert_eq!(round, 1);
    assert_eq!(ranking, vec!["a", "b"]);

    let snap = s.snapshot().await;
    assert_eq!(snap.rounds.len(), 2);
    assert!(snap.rounds.iter().all(|r| r.finalized));
    assert_eq!(snap.rounds[1].answers["b"].status, AnswerStatus::Incorrect);
    assert_eq!(snap.roster.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(), ["a", "b"]);
}

#[tokio::test]
async fn game_stopped_finalizes_last_round_and_returns_to_lobby() {
    let (s, mut peers) = session(Setup::default());
    let mut state = s.subscribe_state();
    let mut events = s.subscribe();
    let peer = join(&s, &mut peers, "a", vec![client("a", "Alice")]).await;

    peer.notify(&OutNotifGameStarted { game_settings: settings() }).await.unwrap();
    peer.notify(&OutNotifQuestion { question_svg: "<svg/>".into() }).await.unwrap();
    wait_state(&mut state, SessionState::AnswerQuestion).await;

    peer.notify(&OutNotifGameStopped(results(vec![answer("a", "にほん", true)])))
        .await
        .unwrap();
    let round = next_event(&mut events, |e| match e {
        SessionEvent::RoundFinalized { round, .. } => Some(round),
        _ => None,
    })
    .await;
    assert_eq!(round, 0);
    let ranking = next_event(&mut events, |e| match e {
        SessionEvent::GameStopped { ranking } => Some(ranking),
        _ => None,
    })
    .await;
    assert_eq!(ranking, vec!["a"]);
    wait_state(&mut state, SessionState::Lobby).await;

    let snap = s.snapshot().await;
    assert!(snap.rounds.is_empty());
    assert!(snap.remaining.is_none());
}

#[tokio::test]
async fn finalized_rounds_are_written_to_the_stats_store() {
    let stats = Arc::new(RecordingStats::default());
    let (s, mut peers) = session(Setup {
        stats: stats.clone(),
        ..Setup::default()
    });
    let mut state = s.subscribe_state();
    let mut events = s.subscribe();
    let peer = join(&s, &mut peers, "a", vec![client("a", "Alice"), client("b", "Bob")]).await;

    peer.notify(&OutNotifGameStarted { game_settings: settings() }).await.unwrap();
    peer.notify(&OutNotifQuestion { question_svg: "<svg>1</svg>".into() }).await.unwrap();
    wait_state(&mut state, SessionState::AnswerQuestion).await;
    assert_eq!(stats.games.lock().unwrap().as_slice(), [settings()]);

    peer.notify(&OutNotifRoundEnded(results(vec![
        answer("a", "にほん", true),
        answer("b", "やま", false),
    ])))
    .await
    .unwrap();
    next_event(&mut events, |e| matches!(e, SessionEvent::RoundFinalized { .. }).then_some(())).await;
    assert_eq!(s.snapshot().await.game_id, Some(77));

    {
        let answers = stats.answers.lock().unwrap();
        assert_eq!(answers.len(), 2);
        let alice = &answers[0];
        assert_eq!(alice.game_id, 77);
        assert_eq!(alice.client_key, "key-a");
        assert_eq!(alice.client_name, "Alice");
        assert_eq!(alice.round, 0);
        assert_eq!(alice.word, "日本");
        assert_eq!(alice.answer, "にほん");
        assert!(alice.is_correct);
        assert_eq!(alice.duration_ms, Some(900));
        assert_eq!(alice.font_name, "NotoSansJP-Regular.ttf");
        let bob = &answers[1];
        assert_eq!((bob.client_key.as_str(), bob.client_name.as_str()), ("key-b", "Bob"));
        assert_eq!(bob.answer, "やま");
        assert!(!bob.is_correct);
    }

    // the last round is written when the game stops
    wait_state(&mut state, SessionState::WaitingQuestion).await;
    peer.notify(&OutNotifQuestion { question_svg: "<svg>2</svg>".into() }).await.unwrap();
    wait_state(&mut state, SessionState::AnswerQuestion).await;
    peer.notify(&OutNotifGameStopped(results(vec![answer("a", "にっぽん", false)])))
        .await
        .unwrap();
    next_event(&mut events, |e| matches!(e, SessionEvent::GameStopped { .. }).then_some(())).await;

    let answers = stats.answers.lock().unwrap();
    assert_eq!(answers.len(), 3);
    assert_eq!(answers[2].game_id, 77);
    assert_eq!(answers[2].round, 1);
    assert_eq!(answers[2].answer, "にっぽん");
    assert!(!answers[2].is_correct);
    assert_eq!(stats.games.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn question_outside_waiting_state_is_ignored() {
    let (s, mut peers) = session(Setup::default());
    let mut state = s.subscribe_state();
    let mut events = s.subscribe();
    let peer = join(&s, &mut peers, "a", vec![client("a", "Alice")]).await;
    let chat = |message: &str| OutNotifChatSent {
        id: "a".into(),
        message: message.into(),
    };

    // in the lobby
    peer.notify(&OutNotifQuestion { question_svg: "<svg>early</svg>".into() }).await.unwrap();
    peer.notify(&chat("lobby")).await.unwrap();
    next_event(&mut events, |e| matches!(e, SessionEvent::Chat { .. }).then_some(())).await;
    assert_eq!(s.state(), SessionState::Lobby);
    let snap = s.snapshot().await;
    assert!(snap.rounds.is_empty());
    assert!(snap.remaining.is_none());
    assert!(s.countdown().await.is_none());

    // while a round is open
    peer.notify(&OutNotifGameStarted { game_settings: settings() }).await.unwrap();
    peer.notify(&OutNotifQuestion { question_svg: "<svg>1</svg>".into() }).await.unwrap();
    wait_state(&mut state, SessionState::AnswerQuestion).await;
    let remaining = *s.countdown().await.unwrap().borrow();
    assert!(remaining <= std::time::Duration::from_secs(30));

    peer.notify(&OutNotifQuestion { question_svg: "<svg>2</svg>".into() }).await.unwrap();
    peer.notify(&chat("round")).await.unwrap();
    next_event(&mut events, |e| match e {
        SessionEvent::Chat { message, .. } if message == "round" => Some(()),
        _ => None,
    })
    .await;
    assert_eq!(s.state(), SessionState::AnswerQuestion);
    let snap = s.snapshot().await;
    assert_eq!(snap.rounds.len(), 1);
    assert_eq!(snap.rounds[0].question_svg, "<svg>1</svg>");
    assert!(!snap.rounds[0].finalized);
}

#[tokio::test]
async fn answering_outside_a_round_is_rejected() {
    let (s, mut peers) = session(Setup::default());
    let err = s.send_answer("x").await.unwrap_err();
    assert!(matches!(err, QuizError::InvalidState(_)));

    let mut state = s.subscribe_state();
    let peer = join(&s, &mut peers, "a", vec![client("a", "Alice")]).await;
    let err = s.send_answer("x").await.unwrap_err();
    assert_eq!(err.kind().as_str(), "APPLICATION");

    peer.notify(&OutNotifGameStarted { game_settings: settings() }).await.unwrap();
    wait_state(&mut state, SessionState::WaitingQuestion).await;
    assert!(matches!(s.send_answer("x").await, Err(QuizError::InvalidState(_))));
    assert!(matches!(s.start_game(&settings()).await, Err(QuizError::InvalidState(_))));
}

#[tokio::test]
async fn question_request_is_answered_with_same_correlation_id() {
    let (s, mut peers) = session(Setup::default());
    let mut peer = join(&s, &mut peers, "a", vec![client("a", "Alice")]).await;

    peer.send_envelope(&Envelope::reply(&OutReqQuestion {}, "q-7").unwrap())
        .await
        .unwrap();
    let reply = expect_request(&mut peer, MessageType::InRespQuestion).await;
    assert_eq!(reply.correlation_id, "q-7");

    let q = reply.payload_as::<InRespQuestion>().unwrap();
    assert!(["日本", "山", "川"].contains(&q.question.word_info.word.as_str()));
    assert_eq!(q.question.font_name, "NotoSansJP-Regular.ttf");
    assert!(q.question_svg.contains(&q.question.word_info.word));
}

#[tokio::test]
async fn question_source_gives_up_after_retries() {
    let words = Arc::new(BrokenWords::default());
    let (s, mut peers) = session(Setup {
        words: words.clone(),
        ..Setup::default()
    });
    let mut events = s.subscribe();
    let peer = join(&s, &mut peers, "a", vec![client("a", "Alice")]).await;

    peer.send_envelope(&Envelope::reply(&OutReqQuestion {}, "q-1").unwrap())
        .await
        .unwrap();
    let error = next_event(&mut events, |e| match e {
        SessionEvent::QuestionSourceFailed { error } => Some(error),
        _ => None,
    })
    .await;
    assert!(error.contains("3 attempts"), "{error}");
    assert_eq!(words.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn admin_notice_for_unknown_client_is_a_fault() {
    let (s, mut peers) = session(Setup::default());
    let mut events = s.subscribe();
    let peer = join(&s, &mut peers, "a", vec![client("a", "Alice")]).await;

    peer.notify(&OutNotifAdminMade { id: "ghost".into() }).await.unwrap();
    let code = next_event(&mut events, |e| match e {
        SessionEvent::Fault { code, .. } => Some(code),
        _ => None,
    })
    .await;
    assert_eq!(code, "APPLICATION");

    peer.notify(&OutNotifAdminMade { id: "a".into() }).await.unwrap();
    next_event(&mut events, |e| matches!(e, SessionEvent::RosterChanged(_)).then_some(())).await;
    assert!(s.is_admin("a").await.unwrap());
    assert!(s.is_admin("ghost").await.is_err());
}

#[tokio::test]
async fn socket_close_drops_session_to_off() {
    let (s, mut peers) = session(Setup::default());
    let mut state = s.subscribe_state();
    let peer = join(&s, &mut peers, "a", vec![client("a", "Alice")]).await;
    wait_state(&mut state, SessionState::Lobby).await;

    peer.close().await;
    wait_state(&mut state, SessionState::Off).await;
    let snap = s.snapshot().await;
    assert!(snap.client_id.is_none());
    assert!(snap.roster.is_empty());

    // and the session can join again
    let _peer = join(&s, &mut peers, "a2", vec![client("a2", "Alice")]).await;
    assert_eq!(s.state(), SessionState::Lobby);
    s.disconnect().await;
    assert_eq!(s.state(), SessionState::Off);
}
