//! Lifecycle of staged emails: create, count, paginated view, send-and-purge.
//!
//! [`StagingRepository`] is the single capability request handlers and the
//! dispatch CLI depend on; [`StagingService`] is its only implementation.

mod error;
mod pagination;

use std::sync::Arc;

use crate::mail::MailDispatch;
use crate::models::{EmailRecord, SendReport, ViewOutcome};
use crate::storage::{PageCursor, STAGING_TTL, StorageGateway};
use crate::validation;

pub use error::{StagingError, StagingResult};
pub use pagination::{PAGE_SIZE, first_row_offset};

#[rocket::async_trait]
pub trait StagingRepository: Send + Sync {
    /// Validate and stage a record for [`STAGING_TTL`].
    async fn create(&self, record: &EmailRecord) -> StagingResult<()>;

    /// Live staged records for a recipient.
    async fn count(&self, email: &str) -> StagingResult<i64>;

    /// One page (of [`PAGE_SIZE`]) of a recipient's staged records.
    async fn view_page(&self, page_number: i64, email: &str) -> StagingResult<ViewOutcome>;

    /// Mail every record sharing `magic_number`, then delete the delivered ones.
    async fn send_pending(&self, magic_number: i32) -> StagingResult<SendReport>;
}

/// Shared handle stored in Rocket state.
pub type SharedRepository = Arc<dyn StagingRepository>;

pub struct StagingService {
    gateway: Arc<dyn StorageGateway>,
    mailer: Arc<dyn MailDispatch>,
}

impl StagingService {
    pub fn new(gateway: Arc<dyn StorageGateway>, mailer: Arc<dyn MailDispatch>) -> Self {
        Self { gateway, mailer }
    }

    pub fn shared(self) -> SharedRepository {
        Arc::new(self)
    }

    async fn purge(&self, sent: &[EmailRecord], magic_number: i32) -> StagingResult<usize> {
        let mut purged = 0;
        let mut failures = Vec::new();

        for record in sent {
            match self.gateway.delete(&record.email, magic_number).await {
                Ok(()) => purged += 1,
                Err(err) => {
                    log::error!(
                        "failed to delete staged record ({}, {}): {}",
                        record.email,
                        magic_number,
                        err
                    );
                    failures.push(err);
                }
            }
        }

        match failures.into_iter().next() {
            None => Ok(purged),
            Some(first) => Err(StagingError::Purge {
                failed: sent.len() - purged,
                total: sent.len(),
                source: first,
            }),
        }
    }
}

#[rocket::async_trait]
impl StagingRepository for StagingService {
    async fn create(&self, record: &EmailRecord) -> StagingResult<()> {
        validation::validate(record)?;
        self.gateway.insert(record, STAGING_TTL).await?;
        log::debug!(
            "staged email for {} (magic number {})",
            record.email,
            record.magic_number
        );
        Ok(())
    }

    async fn count(&self, email: &str) -> StagingResult<i64> {
        Ok(self.gateway.count(email).await?)
    }

    async fn view_page(&self, page_number: i64, email: &str) -> StagingResult<ViewOutcome> {
        let page_number = page_number.max(1);
        let offset = first_row_offset(page_number);
        let total = self.count(email).await?;

        if total <= offset {
            return Ok(ViewOutcome::NoMoreRecords);
        }

        // Walk pages sequentially; only the final page's rows are kept.
        let mut cursor = PageCursor::Start;
        let mut current = 1;
        loop {
            let page = self
                .gateway
                .select_page(email, PAGE_SIZE as i32, cursor)
                .await?;

            if current == page_number {
                return Ok(ViewOutcome::Page(page.rows));
            }
            if page.next.is_exhausted() {
                // Rows expired between the count and the scan.
                return Ok(ViewOutcome::NoMoreRecords);
            }

            cursor = page.next;
            current += 1;
        }
    }

    async fn send_pending(&self, magic_number: i32) -> StagingResult<SendReport> {
        validation::check_magic_number(magic_number)?;

        let batch = self.gateway.select_by_magic_number(magic_number).await?;
        if batch.is_empty() {
            log::info!("no staged emails for magic number {}", magic_number);
            return Ok(SendReport {
                magic_number,
                sent: 0,
                purged: 0,
            });
        }

        log::info!(
            "sending {} staged email(s) for magic number {}",
            batch.len(),
            magic_number
        );

        match self.mailer.dispatch(&batch).await {
            Ok(sent) => {
                let sent = sent.min(batch.len());
                let purged = self.purge(&batch[..sent], magic_number).await?;
                Ok(SendReport {
                    magic_number,
                    sent,
                    purged,
                })
            }
            Err(dispatch_err) => {
                let sent = dispatch_err.sent.min(batch.len());
                match self.purge(&batch[..sent], magic_number).await {
                    Ok(_) => Err(dispatch_err.into()),
                    Err(purge_err) => Err(StagingError::PartialDispatch {
                        dispatch: dispatch_err,
                        purge: Box::new(purge_err),
                    }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryGateway, RecordingMailer};
    use crate::validation::ValidationError;
    use std::time::Duration;

    struct Fixture {
        gateway: Arc<MemoryGateway>,
        mailer: Arc<RecordingMailer>,
        service: StagingService,
    }

    fn fixture() -> Fixture {
        let gateway = Arc::new(MemoryGateway::new());
        let mailer = Arc::new(RecordingMailer::new());
        let service = StagingService::new(gateway.clone(), mailer.clone());
        Fixture {
            gateway,
            mailer,
            service,
        }
    }

    async fn stage_five(service: &StagingService) {
        for magic in 1..=5 {
            service
                .create(&EmailRecord::new(
                    "a@example.com",
                    format!("title {magic}"),
                    "body",
                    magic,
                ))
                .await
                .unwrap();
        }
    }

    fn magic_numbers(outcome: &ViewOutcome) -> Vec<i32> {
        match outcome {
            ViewOutcome::Page(rows) => rows.iter().map(|r| r.magic_number).collect(),
            ViewOutcome::NoMoreRecords => panic!("expected a page, got no records"),
        }
    }

    #[tokio::test]
    async fn incomplete_records_are_never_written() {
        let f = fixture();
        let incomplete = [
            EmailRecord::new("", "t", "c", 1),
            EmailRecord::new("a@example.com", "", "c", 1),
            EmailRecord::new("a@example.com", "t", "", 1),
            EmailRecord::new("a@example.com", "t", "c", 0),
        ];
        for record in incomplete {
            let err = f.service.create(&record).await.unwrap_err();
            assert!(matches!(err, StagingError::Validation(ValidationError::Incomplete)));
        }
        assert_eq!(f.gateway.live_rows(), 0);
    }

    #[tokio::test]
    async fn invalid_addresses_are_never_written() {
        let f = fixture();
        for address in ["nobody", "a@", "@example.com", "a b@example.com"] {
            let err = f
                .service
                .create(&EmailRecord::new(address, "t", "c", 1))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                StagingError::Validation(ValidationError::InvalidAddress(_))
            ));
        }
        assert_eq!(f.gateway.live_rows(), 0);
    }

    #[tokio::test]
    async fn created_record_appears_once_on_first_page() {
        let f = fixture();
        let record = EmailRecord::new("solo@example.com", "Hi", "Body", 7);
        f.service.create(&record).await.unwrap();

        let outcome = f.service.view_page(1, "solo@example.com").await.unwrap();
        assert_eq!(outcome, ViewOutcome::Page(vec![record]));
    }

    #[tokio::test]
    async fn five_records_split_across_two_pages() {
        let f = fixture();
        stage_five(&f.service).await;

        assert_eq!(f.service.count("a@example.com").await.unwrap(), 5);

        let first = f.service.view_page(1, "a@example.com").await.unwrap();
        assert_eq!(magic_numbers(&first), vec![1, 2, 3, 4]);

        let second = f.service.view_page(2, "a@example.com").await.unwrap();
        assert_eq!(magic_numbers(&second), vec![5]);

        let third = f.service.view_page(3, "a@example.com").await.unwrap();
        assert_eq!(third, ViewOutcome::NoMoreRecords);
    }

    #[tokio::test]
    async fn exact_multiple_of_page_size_has_no_trailing_page() {
        let f = fixture();
        for magic in 1..=8 {
            f.service
                .create(&EmailRecord::new("b@example.com", "t", "c", magic))
                .await
                .unwrap();
        }

        let second = f.service.view_page(2, "b@example.com").await.unwrap();
        assert_eq!(magic_numbers(&second), vec![5, 6, 7, 8]);
        assert_eq!(
            f.service.view_page(3, "b@example.com").await.unwrap(),
            ViewOutcome::NoMoreRecords
        );
    }

    #[tokio::test]
    async fn unknown_recipient_and_low_page_numbers() {
        let f = fixture();
        assert_eq!(
            f.service.view_page(1, "nobody@example.com").await.unwrap(),
            ViewOutcome::NoMoreRecords
        );

        stage_five(&f.service).await;
        let page_zero = f.service.view_page(0, "a@example.com").await.unwrap();
        assert_eq!(magic_numbers(&page_zero), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn expired_records_are_not_viewed_or_sent() {
        let f = fixture();
        stage_five(&f.service).await;
        f.gateway.advance(STAGING_TTL + Duration::from_secs(1));

        assert_eq!(f.service.count("a@example.com").await.unwrap(), 0);
        assert_eq!(
            f.service.view_page(1, "a@example.com").await.unwrap(),
            ViewOutcome::NoMoreRecords
        );
        let report = f.service.send_pending(1).await.unwrap();
        assert_eq!(report.sent, 0);
        assert!(f.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn send_dispatches_then_purges_group() {
        let f = fixture();
        let record = EmailRecord::new("c@example.com", "Subject", "Content", 42);
        f.service.create(&record).await.unwrap();

        let report = f.service.send_pending(42).await.unwrap();
        assert_eq!(
            report,
            SendReport {
                magic_number: 42,
                sent: 1,
                purged: 1
            }
        );
        assert_eq!(f.mailer.sent(), vec![record]);
        assert_eq!(f.gateway.live_rows(), 0);

        let again = f.service.send_pending(42).await.unwrap();
        assert_eq!(again.sent, 0);
        assert_eq!(f.mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn send_only_touches_matching_magic_number() {
        let f = fixture();
        f.service
            .create(&EmailRecord::new("a@example.com", "t", "c", 1))
            .await
            .unwrap();
        f.service
            .create(&EmailRecord::new("b@example.com", "t", "c", 1))
            .await
            .unwrap();
        f.service
            .create(&EmailRecord::new("a@example.com", "t", "c", 2))
            .await
            .unwrap();

        let report = f.service.send_pending(1).await.unwrap();
        assert_eq!(report.sent, 2);
        assert_eq!(report.purged, 2);
        assert_eq!(f.gateway.live_rows(), 1);
        assert_eq!(f.service.count("a@example.com").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn partial_dispatch_purges_only_delivered_records() {
        let f = fixture();
        for email in ["a@example.com", "b@example.com", "c@example.com"] {
            f.service
                .create(&EmailRecord::new(email, "t", "c", 9))
                .await
                .unwrap();
        }
        f.mailer.fail_after(1);

        let err = f.service.send_pending(9).await.unwrap_err();
        assert!(matches!(err, StagingError::Dispatch(ref e) if e.sent == 1));
        assert_eq!(f.mailer.sent().len(), 1);
        assert_eq!(f.gateway.live_rows(), 2);
    }

    #[tokio::test]
    async fn delete_failures_do_not_stop_other_deletes() {
        let f = fixture();
        for email in ["a@example.com", "b@example.com", "c@example.com"] {
            f.service
                .create(&EmailRecord::new(email, "t", "c", 5))
                .await
                .unwrap();
        }
        f.gateway.fail_deletes_for(Some("a@example.com"));

        let err = f.service.send_pending(5).await.unwrap_err();
        assert!(matches!(
            err,
            StagingError::Purge {
                failed: 1,
                total: 3,
                ..
            }
        ));
        assert_eq!(f.mailer.sent().len(), 3);
        assert_eq!(f.gateway.live_rows(), 1);
    }

    #[tokio::test]
    async fn partial_dispatch_reports_purge_failure_too() {
        let f = fixture();
        for email in ["a@example.com", "b@example.com"] {
            f.service
                .create(&EmailRecord::new(email, "t", "c", 11))
                .await
                .unwrap();
        }
        f.mailer.fail_after(1);
        f.gateway.fail_deletes_for(Some("a@example.com"));

        let err = f.service.send_pending(11).await.unwrap_err();
        match err {
            StagingError::PartialDispatch { dispatch, purge } => {
                assert_eq!(dispatch.sent, 1);
                assert!(matches!(*purge, StagingError::Purge { failed: 1, total: 1, .. }));
            }
            other => panic!("expected partial dispatch, got {other:?}"),
        }
        assert_eq!(f.gateway.live_rows(), 2);
    }

    #[tokio::test]
    async fn zero_magic_number_is_rejected_before_any_query() {
        let f = fixture();
        f.service
            .create(&EmailRecord::new("a@example.com", "t", "c", 1))
            .await
            .unwrap();

        let err = f.service.send_pending(0).await.unwrap_err();
        assert!(matches!(err, StagingError::Validation(ValidationError::Incomplete)));
        assert!(f.mailer.sent().is_empty());
        assert_eq!(f.gateway.live_rows(), 1);
    }

    struct OverReportingMailer;

    #[rocket::async_trait]
    impl MailDispatch for OverReportingMailer {
        async fn dispatch(
            &self,
            batch: &[EmailRecord],
        ) -> Result<usize, crate::mail::DispatchError> {
            Ok(batch.len() + 3)
        }
    }

    #[tokio::test]
    async fn delivery_count_is_clamped_to_batch() {
        let gateway = Arc::new(MemoryGateway::new());
        let service = StagingService::new(gateway.clone(), Arc::new(OverReportingMailer));
        service
            .create(&EmailRecord::new("a@example.com", "t", "c", 4))
            .await
            .unwrap();

        let report = service.send_pending(4).await.unwrap();
        assert_eq!(report.sent, 1);
        assert_eq!(report.purged, 1);
        assert_eq!(gateway.live_rows(), 0);
    }
}
