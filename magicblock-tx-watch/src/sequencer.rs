use crate::watcher::{DetailRecord, StatusRecord};

/// What to do about the detail fetch of a transaction given its current
/// status and detail records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailAction {
    /// Request the transaction details
    Fetch,
    /// The status did not reach max confirmations yet, it is not known or
    /// its fetch did not resolve
    AwaitMaxConfirmations,
    /// Details were requested already
    AlreadyRequested,
}

fn status_reached_max_confirmations(status: Option<&StatusRecord>) -> bool {
    matches!(
        status.and_then(|record| record.data()),
        Some(Some(info)) if info.confirmations.is_max()
    )
}

/// Details are fetched exactly once per observed transaction, namely when
/// its status reached max confirmations and no detail record exists yet.
pub fn next_detail_action(
    status: Option<&StatusRecord>,
    detail: Option<&DetailRecord>,
) -> DetailAction {
    if !status_reached_max_confirmations(status) {
        return DetailAction::AwaitMaxConfirmations;
    }
    match detail {
        Some(_) => DetailAction::AlreadyRequested,
        None => DetailAction::Fetch,
    }
}

/// A retry only refetches details whose previous fetch failed.
pub fn detail_retry_action(
    status: Option<&StatusRecord>,
    detail: Option<&DetailRecord>,
) -> DetailAction {
    if !status_reached_max_confirmations(status) {
        return DetailAction::AwaitMaxConfirmations;
    }
    match detail {
        Some(record) if record.is_failed() => DetailAction::Fetch,
        Some(_) => DetailAction::AlreadyRequested,
        None => DetailAction::Fetch,
    }
}

#[cfg(test)]
mod tests {
    use magicblock_rpc_client::Confirmations;

    use super::*;
    use crate::{fetch_cache::FetchRecord, testing::utils::status_info};

    fn fetched(confirmations: Confirmations) -> StatusRecord {
        FetchRecord::Fetched(Some(status_info(confirmations)))
    }

    #[test]
    fn test_no_detail_before_status_resolved() {
        assert_eq!(
            next_detail_action(None, None),
            DetailAction::AwaitMaxConfirmations
        );
        assert_eq!(
            next_detail_action(Some(&FetchRecord::Fetching), None),
            DetailAction::AwaitMaxConfirmations
        );
    }

    #[test]
    fn test_no_detail_for_missing_or_failed_status() {
        assert_eq!(
            next_detail_action(Some(&FetchRecord::Fetched(None)), None),
            DetailAction::AwaitMaxConfirmations
        );
        assert_eq!(
            next_detail_action(
                Some(&FetchRecord::FetchFailed("down".to_string())),
                None
            ),
            DetailAction::AwaitMaxConfirmations
        );
    }

    #[test]
    fn test_no_detail_below_max_confirmations() {
        assert_eq!(
            next_detail_action(Some(&fetched(Confirmations::Count(31))), None),
            DetailAction::AwaitMaxConfirmations
        );
    }

    #[test]
    fn test_detail_fetched_once_at_max_confirmations() {
        let status = fetched(Confirmations::Max);
        assert_eq!(
            next_detail_action(Some(&status), None),
            DetailAction::Fetch
        );
        for detail in [
            FetchRecord::Fetching,
            FetchRecord::Fetched(None),
            FetchRecord::FetchFailed("down".to_string()),
        ] {
            assert_eq!(
                next_detail_action(Some(&status), Some(&detail)),
                DetailAction::AlreadyRequested
            );
        }
    }

    #[test]
    fn test_retry_only_refetches_failed_detail() {
        let status = fetched(Confirmations::Max);
        assert_eq!(
            detail_retry_action(
                Some(&status),
                Some(&FetchRecord::FetchFailed("down".to_string()))
            ),
            DetailAction::Fetch
        );
        assert_eq!(
            detail_retry_action(Some(&status), Some(&FetchRecord::Fetching)),
            DetailAction::AlreadyRequested
        );
        assert_eq!(
            detail_retry_action(
                Some(&fetched(Confirmations::Count(1))),
                Some(&FetchRecord::FetchFailed("down".to_string()))
            ),
            DetailAction::AwaitMaxConfirmations
        );
    }
}
