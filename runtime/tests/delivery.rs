//! Notifier delivery policy.

mod common;

use chrono::{TimeZone, Utc};
use common::{RecordingTransport, BASE_URL, CHAT};
use makerwatch::error::DeliveryFailure;
use makerwatch::model::{ExtractedItem, ExtractionResult, ItemList};
use makerwatch::notify::throttle::NoThrottle;
use makerwatch::notify::{DeliveryReport, Notifier, NotifyMode, Target};
use makerwatch::transport::ChatId;
use std::sync::Arc;

fn result_with(n: usize) -> ExtractionResult {
    let items = (1..=n)
        .map(|i| {
            ExtractedItem::new()
                .with("href", format!("/en/models/{i}-model"))
                .with("title", format!("Model {i}"))
        })
        .collect();
    ExtractionResult::new(
        vec![ItemList {
            name: "models".into(),
            items,
        }],
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
    )
}

fn notifier(transport: Arc<RecordingTransport>) -> Notifier {
    Notifier::new(transport, Arc::new(NoThrottle), ChatId::new(CHAT), BASE_URL)
}

#[tokio::test]
async fn test_per_item_failure_does_not_stop_later_messages() {
    let transport = Arc::new(RecordingTransport::failing_on(&[3]));
    let report = notifier(transport.clone())
        .notify(&result_with(5), &Target::Default, NotifyMode::PerItem)
        .await
        .unwrap();

    assert_eq!(
        report,
        DeliveryReport {
            attempted: 5,
            succeeded: 4,
            failed: 1
        }
    );

    let sent = transport.sent();
    assert_eq!(sent.len(), 5);
    assert!(!sent[2].delivered);
    assert!(sent[3].text.contains("Model 4"));
    assert!(sent[4].text.contains("Model 5"));
}

#[tokio::test]
async fn test_per_item_messages_in_order_to_default_chat() {
    let transport = Arc::new(RecordingTransport::new());
    notifier(transport.clone())
        .notify(&result_with(3), &Target::Default, NotifyMode::PerItem)
        .await
        .unwrap();

    let sent = transport.sent();
    assert_eq!(sent.len(), 3);
    for (i, msg) in sent.iter().enumerate() {
        assert_eq!(msg.chat.as_str(), CHAT);
        assert!(msg.options.markdown);
        assert_eq!(msg.options.reply_to, None);
        assert!(msg.text.starts_with("🔍 *New 3D Model Found!*"));
        assert!(msg
            .text
            .contains(&format!("🔗 https://makerworld.com/en/models/{}-model", i + 1)));
        assert!(msg.text.contains("📅 Time: 2025-06-01T12:00:00.000Z"));
    }
}

#[tokio::test]
async fn test_requester_target_replies_in_requesting_chat() {
    let transport = Arc::new(RecordingTransport::new());
    let target = Target::Requester {
        chat: ChatId::new("777"),
        reply_to: 55,
    };
    notifier(transport.clone())
        .notify(&result_with(2), &target, NotifyMode::PerItem)
        .await
        .unwrap();

    for msg in transport.sent() {
        assert_eq!(msg.chat.as_str(), "777");
        assert_eq!(msg.options.reply_to, Some(55));
    }
}

#[tokio::test]
async fn test_empty_result_sends_nothing() {
    let transport = Arc::new(RecordingTransport::new());
    let report = notifier(transport.clone())
        .notify(&result_with(0), &Target::Default, NotifyMode::PerItem)
        .await
        .unwrap();

    assert_eq!(report, DeliveryReport::default());
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_digest_is_a_single_message() {
    let transport = Arc::new(RecordingTransport::new());
    let report = notifier(transport.clone())
        .notify(&result_with(5), &Target::Default, NotifyMode::Digest)
        .await
        .unwrap();

    assert_eq!(report.attempted, 1);
    assert_eq!(report.succeeded, 1);
    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text.contains("*models* (5)"));
    assert!(sent[0].text.contains("5. *Model 5*"));
}

#[tokio::test]
async fn test_digest_failure_is_fatal() {
    let transport = Arc::new(RecordingTransport::failing_on(&[1]));
    let err = notifier(transport.clone())
        .notify(&result_with(5), &Target::Default, NotifyMode::Digest)
        .await
        .unwrap_err();

    assert!(matches!(err, DeliveryFailure::Rejected { code: 429, .. }));
    assert_eq!(transport.sent().iter().filter(|m| m.delivered).count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_fixed_delay_between_messages() {
    use makerwatch::notify::throttle::FixedDelay;
    use std::time::Duration;

    let transport = Arc::new(RecordingTransport::new());
    let notifier = Notifier::new(
        transport.clone(),
        Arc::new(FixedDelay(Duration::from_secs(1))),
        ChatId::new(CHAT),
        BASE_URL,
    );

    let start = tokio::time::Instant::now();
    notifier
        .notify(&result_with(3), &Target::Default, NotifyMode::PerItem)
        .await
        .unwrap();
    assert!(start.elapsed() >= Duration::from_secs(3));
    assert_eq!(transport.sent().len(), 3);
}
