use std::time::Duration;

use mockall::Sequence;
use rstest::rstest;
use tokio_util::sync::CancellationToken;

use crate::database::{DatabaseError, MockDatabase};
use crate::jobs::types::JobStatus;
use crate::jobs::{MockJob, ProcessingError};
use crate::queue::{MockQueueProvider, QueueError, QueueMessage};
use crate::tests::common::{default_queue_message, test_config};
use crate::worker::{ConsumptionError, Worker};

fn store_unavailable() -> DatabaseError {
    DatabaseError::Unavailable(mongodb::error::Error::from(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "store unreachable",
    )))
}

#[rstest]
#[tokio::test]
async fn processes_message_and_acknowledges_only_after_terminal_write(default_queue_message: QueueMessage) {
    let mut seq = Sequence::new();
    let token = CancellationToken::new();

    let mut queue = MockQueueProvider::new();
    let mut database = MockDatabase::new();
    let mut processor = MockJob::new();

    let message = default_queue_message.clone();
    let receipt = default_queue_message.receipt_handle.clone();

    queue
        .expect_receive_message()
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |_| Ok(Some(message.clone())));
    database
        .expect_set_job_status()
        .withf(|id, status| id == "abc-123" && *status == JobStatus::InProgress)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));
    queue.expect_extend_visibility().times(1).in_sequence(&mut seq).returning(|_, _| Ok(()));
    processor
        .expect_process_job()
        .withf(|body| body == "build-report")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    database
        .expect_set_job_status()
        .withf(|id, status| id == "abc-123" && *status == JobStatus::Complete)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));
    queue
        .expect_delete_message()
        .withf(move |receipt_handle| receipt_handle == receipt.as_str())
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));

    // second poll comes up empty and the stop request lands; the next
    // iteration boundary ends the loop
    let poll_token = token.clone();
    queue.expect_receive_message().times(1).in_sequence(&mut seq).returning(move |_| {
        poll_token.cancel();
        Ok(None)
    });

    let worker = Worker::new(test_config(queue, database, processor), token);
    worker.run().await;
}

#[rstest]
#[tokio::test]
async fn stop_before_polling_never_touches_the_queue() {
    let mut queue = MockQueueProvider::new();
    queue.expect_receive_message().never();
    queue.expect_delete_message().never();

    let mut database = MockDatabase::new();
    database.expect_set_job_status().never();

    let token = CancellationToken::new();
    token.cancel();

    let worker = Worker::new(test_config(queue, database, MockJob::new()), token);
    worker.run().await;
}

#[rstest]
#[tokio::test]
async fn stop_after_receive_abandons_message_without_acknowledging(default_queue_message: QueueMessage) {
    let token = CancellationToken::new();

    let mut queue = MockQueueProvider::new();
    let poll_token = token.clone();
    let message = default_queue_message;
    queue.expect_receive_message().times(1).returning(move |_| {
        // the stop request races the poll and loses; the message must still
        // be abandoned for redelivery, never started
        poll_token.cancel();
        Ok(Some(message.clone()))
    });
    queue.expect_extend_visibility().never();
    queue.expect_delete_message().never();

    let mut database = MockDatabase::new();
    database.expect_set_job_status().never();

    let mut processor = MockJob::new();
    processor.expect_process_job().never();

    let worker = Worker::new(test_config(queue, database, processor), token);
    worker.run().await;
}

#[rstest]
#[tokio::test]
async fn store_outage_leaves_message_queued_and_worker_alive(default_queue_message: QueueMessage) {
    let mut seq = Sequence::new();
    let token = CancellationToken::new();

    let mut queue = MockQueueProvider::new();
    let mut database = MockDatabase::new();
    let mut processor = MockJob::new();

    let message = default_queue_message;
    queue
        .expect_receive_message()
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |_| Ok(Some(message.clone())));
    database
        .expect_set_job_status()
        .withf(|_, status| *status == JobStatus::InProgress)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Err(store_unavailable()));

    // the worker keeps polling after the failed iteration instead of exiting
    let poll_token = token.clone();
    queue.expect_receive_message().times(1).in_sequence(&mut seq).returning(move |_| {
        poll_token.cancel();
        Ok(None)
    });

    queue.expect_delete_message().never();
    processor.expect_process_job().never();

    let worker = Worker::new(test_config(queue, database, processor), token);
    worker.run().await;
}

#[rstest]
#[tokio::test]
async fn transient_poll_error_backs_off_and_resumes() {
    let mut seq = Sequence::new();
    let token = CancellationToken::new();

    let mut queue = MockQueueProvider::new();
    queue
        .expect_receive_message()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Err(QueueError::Transport("connection reset".to_string())));
    let poll_token = token.clone();
    queue.expect_receive_message().times(1).in_sequence(&mut seq).returning(move |_| {
        poll_token.cancel();
        Ok(None)
    });
    queue.expect_delete_message().never();

    let worker = Worker::new(test_config(queue, MockDatabase::new(), MockJob::new()), token);
    worker.run().await;
}

#[rstest]
#[tokio::test]
async fn processing_failure_leaves_message_unacknowledged(default_queue_message: QueueMessage) {
    let mut queue = MockQueueProvider::new();
    queue.expect_extend_visibility().returning(|_, _| Ok(()));
    queue.expect_delete_message().never();

    let mut database = MockDatabase::new();
    database
        .expect_set_job_status()
        .withf(|_, status| *status == JobStatus::InProgress)
        .times(1)
        .returning(|_, _| Ok(()));
    database.expect_set_job_status().withf(|_, status| status.is_terminal()).never();

    let mut processor = MockJob::new();
    processor
        .expect_process_job()
        .times(1)
        .returning(|_| Err(ProcessingError::Failed("report generation panicked".to_string())));

    let worker = Worker::new(test_config(queue, database, processor), CancellationToken::new());
    let result = worker.handle_message(&default_queue_message).await;

    assert!(matches!(
        result,
        Err(ConsumptionError::ProcessingFailed { attempt: 1, .. })
    ));
}

#[rstest]
#[tokio::test]
async fn exhausted_deliveries_settle_as_failed_before_acknowledging(mut default_queue_message: QueueMessage) {
    default_queue_message.receive_count = 4;

    let mut seq = Sequence::new();

    let mut database = MockDatabase::new();
    database
        .expect_set_job_status()
        .withf(|id, status| id == "abc-123" && *status == JobStatus::Failed)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));

    let mut queue = MockQueueProvider::new();
    queue.expect_delete_message().times(1).in_sequence(&mut seq).returning(|_| Ok(()));

    let mut processor = MockJob::new();
    processor.expect_process_job().never();

    let worker = Worker::new(test_config(queue, database, processor), CancellationToken::new());
    worker.handle_message(&default_queue_message).await.unwrap();
}

#[rstest]
#[tokio::test]
async fn exhausted_deliveries_stay_queued_while_store_is_down(mut default_queue_message: QueueMessage) {
    default_queue_message.receive_count = 4;

    let mut database = MockDatabase::new();
    database.expect_set_job_status().times(1).returning(|_, _| Err(store_unavailable()));

    let mut queue = MockQueueProvider::new();
    queue.expect_delete_message().never();

    let worker = Worker::new(test_config(queue, database, MockJob::new()), CancellationToken::new());
    let result = worker.handle_message(&default_queue_message).await;

    assert!(matches!(result, Err(ConsumptionError::Database(DatabaseError::Unavailable(_)))));
}

#[rstest]
#[tokio::test]
async fn duplicate_delivery_of_finished_job_acknowledges_without_reprocessing(default_queue_message: QueueMessage) {
    let mut database = MockDatabase::new();
    database.expect_set_job_status().times(1).returning(|id, status| {
        Err(DatabaseError::InvalidTransition { id: id.to_string(), from: JobStatus::Complete, to: status })
    });

    let mut queue = MockQueueProvider::new();
    queue.expect_delete_message().times(1).returning(|_| Ok(()));
    queue.expect_extend_visibility().never();

    let mut processor = MockJob::new();
    processor.expect_process_job().never();

    let worker = Worker::new(test_config(queue, database, processor), CancellationToken::new());
    worker.handle_message(&default_queue_message).await.unwrap();
}

#[rstest]
#[tokio::test]
async fn recordless_message_is_still_processed_and_acknowledged(default_queue_message: QueueMessage) {
    let mut database = MockDatabase::new();
    database
        .expect_set_job_status()
        .withf(|_, status| *status == JobStatus::InProgress)
        .times(1)
        .returning(|id, _| Err(DatabaseError::NotFound { id: id.to_string() }));
    database.expect_set_job_status().withf(|_, status| status.is_terminal()).never();

    let mut queue = MockQueueProvider::new();
    queue.expect_extend_visibility().returning(|_, _| Ok(()));
    queue.expect_delete_message().times(1).returning(|_| Ok(()));

    let mut processor = MockJob::new();
    processor.expect_process_job().times(1).returning(|_| Ok(()));

    let worker = Worker::new(test_config(queue, database, processor), CancellationToken::new());
    worker.handle_message(&default_queue_message).await.unwrap();
}

#[rstest]
#[tokio::test]
async fn terminal_write_failure_prevents_acknowledgement(default_queue_message: QueueMessage) {
    let mut database = MockDatabase::new();
    database
        .expect_set_job_status()
        .withf(|_, status| *status == JobStatus::InProgress)
        .times(1)
        .returning(|_, _| Ok(()));
    database
        .expect_set_job_status()
        .withf(|_, status| *status == JobStatus::Complete)
        .times(1)
        .returning(|_, _| Err(store_unavailable()));

    let mut queue = MockQueueProvider::new();
    queue.expect_extend_visibility().returning(|_, _| Ok(()));
    queue.expect_delete_message().never();

    let mut processor = MockJob::new();
    processor.expect_process_job().times(1).returning(|_| Ok(()));

    let worker = Worker::new(test_config(queue, database, processor), CancellationToken::new());
    let result = worker.handle_message(&default_queue_message).await;

    assert!(matches!(result, Err(ConsumptionError::Database(DatabaseError::Unavailable(_)))));
}

#[rstest]
#[tokio::test]
async fn visibility_extension_failure_does_not_stop_the_job(default_queue_message: QueueMessage) {
    let mut database = MockDatabase::new();
    database.expect_set_job_status().times(2).returning(|_, _| Ok(()));

    let mut queue = MockQueueProvider::new();
    queue
        .expect_extend_visibility()
        .times(1)
        .returning(|_, _| Err(QueueError::Transport("receipt expired".to_string())));
    queue.expect_delete_message().times(1).returning(|_| Ok(()));

    let mut processor = MockJob::new();
    processor.expect_process_job().times(1).returning(|_| Ok(()));

    let worker = Worker::new(test_config(queue, database, processor), CancellationToken::new());
    worker.handle_message(&default_queue_message).await.unwrap();
}
