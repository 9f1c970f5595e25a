use super::models::*;
use crate::error::{AppResult, TransactionError};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

/// Ledger repository - THE source of truth for transactions and votes.
///
/// All reconciliation writes go through `apply_payment_outcome`, the single
/// idempotent writer for webhook results. Webhook handlers never touch the
/// tables directly.
pub struct LedgerRepository {
    pub pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ========== TRANSACTION OPERATIONS ==========

    /// Create a pending transaction at checkout initiation
    pub async fn create_transaction(&self, new: NewTransaction) -> AppResult<Transaction> {
        if new.vote_count <= 0 {
            return Err(TransactionError::InvalidVoteCount.into());
        }

        let result = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (
                reference, event_id, category_id, nominee_id, voter_phone,
                vote_count, amount, payment_method, provider
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&new.reference)
        .bind(new.event_id)
        .bind(new.category_id)
        .bind(new.nominee_id)
        .bind(&new.voter_phone)
        .bind(new.vote_count)
        .bind(new.amount)
        .bind(new.payment_method)
        .bind(new.provider)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(transaction) => Ok(transaction),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(TransactionError::DuplicateReference(new.reference).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_transaction_by_reference(
        &self,
        reference: &str,
    ) -> AppResult<Option<Transaction>> {
        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT * FROM transactions WHERE reference = $1
            "#,
        )
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        Ok(transaction)
    }

    /// Apply a provider-reported payment outcome to the ledger.
    ///
    /// This is the one reconciliation write path, safe under duplicate and
    /// concurrent webhook delivery for the same reference:
    /// - the transaction row is locked with SELECT ... FOR UPDATE, so one
    ///   delivery wins and the rest observe its result;
    /// - terminal rows are returned untouched (AlreadyFinal);
    /// - status changes go through the state machine check plus a status
    ///   compare-and-swap in the UPDATE;
    /// - vote materialization happens in the same database transaction,
    ///   with the (transaction_id, unit_index) unique key as a backstop.
    pub async fn apply_payment_outcome(&self, outcome: &PaymentOutcome) -> AppResult<ApplyResult> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT * FROM transactions WHERE reference = $1 FOR UPDATE
            "#,
        )
        .bind(&outcome.reference)
        .fetch_optional(&mut *tx)
        .await?;

        let current = match current {
            Some(t) => t,
            None => return Err(TransactionError::NotFound(outcome.reference.clone()).into()),
        };

        // Duplicate delivery: the reference already reached a terminal state
        if current.status.is_terminal() {
            tx.commit().await?;
            info!(
                "↩️  Duplicate webhook for {} ignored (already {})",
                current.reference, current.status
            );
            return Ok(ApplyResult::AlreadyFinal(current));
        }

        // A live row only accepts outcomes that match what was purchased
        if let Some(reported) = outcome.amount {
            if reported != current.amount {
                return Err(TransactionError::AmountMismatch {
                    expected: current.amount.to_string(),
                    reported: reported.to_string(),
                }
                .into());
            }
        }

        let target = outcome.status.target_status();
        if target == current.status {
            tx.commit().await?;
            return Ok(ApplyResult::Unchanged(current));
        }
        Self::validate_state_transition(current.status, target)?;

        let completed_at: Option<DateTime<Utc>> = if target == TransactionStatus::Completed {
            Some(Utc::now())
        } else {
            None
        };

        let updated = sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions
            SET status = $3,
                provider_ref = COALESCE($4, provider_ref),
                failure_reason = COALESCE($5, failure_reason),
                completed_at = COALESCE($6, completed_at),
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(current.id)
        .bind(current.status)
        .bind(target)
        .bind(&outcome.provider_ref)
        .bind(&outcome.failure_reason)
        .bind(completed_at)
        .fetch_optional(&mut *tx)
        .await?;

        // The row is locked, so the CAS can only miss if something bypassed
        // this code path entirely
        let updated = match updated {
            Some(t) => t,
            None => {
                return Err(TransactionError::InvalidState {
                    current: "unknown".to_string(),
                    expected: current.status.to_string(),
                }
                .into())
            }
        };

        // Materialize votes inside the same database transaction
        let mut votes_created = 0u64;
        if updated.status == TransactionStatus::Completed {
            for (unit_index, unit_amount) in updated.unit_amounts().into_iter().enumerate() {
                let result = sqlx::query(
                    r#"
                    INSERT INTO votes (
                        transaction_id, event_id, category_id, nominee_id, unit_index, amount
                    )
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (transaction_id, unit_index) DO NOTHING
                    "#,
                )
                .bind(updated.id)
                .bind(updated.event_id)
                .bind(updated.category_id)
                .bind(updated.nominee_id)
                .bind(unit_index as i32)
                .bind(unit_amount)
                .execute(&mut *tx)
                .await?;

                votes_created += result.rows_affected();
            }
        }

        tx.commit().await?;

        info!(
            "✓ Payment outcome applied: reference={} status={} votes_created={}",
            updated.reference, updated.status, votes_created
        );

        Ok(ApplyResult::Applied {
            transaction: updated,
            votes_created,
        })
    }

    /// Validate transaction status state machine transitions
    /// Valid transitions:
    /// - Pending → Processing, Completed, Failed, Cancelled
    /// - Processing → Completed, Failed, Cancelled
    /// - Terminal states (Completed, Failed, Cancelled) → NO TRANSITIONS ALLOWED
    fn validate_state_transition(
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> AppResult<()> {
        let allowed_transitions = match from {
            TransactionStatus::Pending => vec![
                TransactionStatus::Processing,
                TransactionStatus::Completed,
                TransactionStatus::Failed,
                TransactionStatus::Cancelled,
            ],
            TransactionStatus::Processing => vec![
                TransactionStatus::Completed,
                TransactionStatus::Failed,
                TransactionStatus::Cancelled,
            ],
            TransactionStatus::Completed
            | TransactionStatus::Failed
            | TransactionStatus::Cancelled => {
                return Err(TransactionError::InvalidState {
                    current: from.to_string(),
                    expected: "No transitions from terminal states".to_string(),
                }
                .into());
            }
        };

        if !allowed_transitions.contains(&to) {
            return Err(TransactionError::InvalidState {
                current: from.to_string(),
                expected: format!("{:?}", allowed_transitions),
            }
            .into());
        }

        Ok(())
    }

    /// Cancel pending transactions that never received a payment result
    pub async fn cancel_stale_pending(&self, older_than: Duration) -> AppResult<u64> {
        let cutoff = Utc::now() - older_than;

        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = $2, updated_at = NOW()
            WHERE status = $1 AND created_at < $3
            "#,
        )
        .bind(TransactionStatus::Pending)
        .bind(TransactionStatus::Cancelled)
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // ========== VOTE OPERATIONS ==========

    pub async fn votes_for_transaction(&self, transaction_id: Uuid) -> AppResult<Vec<Vote>> {
        let votes = sqlx::query_as::<_, Vote>(
            r#"
            SELECT * FROM votes WHERE transaction_id = $1 ORDER BY unit_index
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(votes)
    }

    pub async fn count_votes(&self, transaction_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM votes WHERE transaction_id = $1
            "#,
        )
        .bind(transaction_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    pub async fn nominee_tally(&self, nominee_id: Uuid) -> AppResult<NomineeTally> {
        let (votes, amount): (i64, Decimal) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(amount), 0)
            FROM votes
            WHERE nominee_id = $1
            "#,
        )
        .bind(nominee_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(NomineeTally {
            nominee_id,
            votes,
            amount,
        })
    }

    pub async fn event_tally(&self, event_id: Uuid) -> AppResult<Vec<NomineeTally>> {
        let tallies = sqlx::query_as::<_, NomineeTally>(
            r#"
            SELECT nominee_id, COUNT(*) AS votes, COALESCE(SUM(amount), 0) AS amount
            FROM votes
            WHERE event_id = $1
            GROUP BY nominee_id
            ORDER BY votes DESC, amount DESC
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tallies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn assert_invalid(from: TransactionStatus, to: TransactionStatus) {
        let result = LedgerRepository::validate_state_transition(from, to);
        assert!(
            matches!(
                result,
                Err(AppError::Transaction(TransactionError::InvalidState { .. }))
            ),
            "{} -> {} must be rejected",
            from,
            to
        );
    }

    #[test]
    fn test_live_transitions_allowed() {
        for to in [
            TransactionStatus::Processing,
            TransactionStatus::Completed,
            TransactionStatus::Failed,
            TransactionStatus::Cancelled,
        ] {
            assert!(
                LedgerRepository::validate_state_transition(TransactionStatus::Pending, to)
                    .is_ok()
            );
        }
        for to in [
            TransactionStatus::Completed,
            TransactionStatus::Failed,
            TransactionStatus::Cancelled,
        ] {
            assert!(LedgerRepository::validate_state_transition(
                TransactionStatus::Processing,
                to
            )
            .is_ok());
        }
    }

    #[test]
    fn test_terminal_states_never_transition() {
        let terminals = [
            TransactionStatus::Completed,
            TransactionStatus::Failed,
            TransactionStatus::Cancelled,
        ];
        let all = [
            TransactionStatus::Pending,
            TransactionStatus::Processing,
            TransactionStatus::Completed,
            TransactionStatus::Failed,
            TransactionStatus::Cancelled,
        ];
        for from in terminals {
            for to in all {
                assert_invalid(from, to);
            }
        }
    }

    #[test]
    fn test_processing_cannot_regress_to_pending() {
        assert_invalid(TransactionStatus::Processing, TransactionStatus::Pending);
    }
}
