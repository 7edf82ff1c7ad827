use magicblock_rpc_client::StatusInfo;

/// Counts consecutive status observations that reported the transaction
/// with zero confirmations.
///
/// A transaction can land in a block that never gets confirmed. Once the
/// count reaches the bailout threshold we stop polling its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZeroConfirmationCounter {
    count: u32,
    bailout_threshold: u32,
}

impl ZeroConfirmationCounter {
    pub fn new(bailout_threshold: u32) -> Self {
        Self {
            count: 0,
            bailout_threshold,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn bailout_threshold(&self) -> u32 {
        self.bailout_threshold
    }

    pub fn is_bailed_out(&self) -> bool {
        self.count >= self.bailout_threshold
    }

    /// Records the status of a successfully completed fetch.
    /// Not found results and failed fetches must not be passed here.
    pub fn observe(&mut self, info: &StatusInfo) {
        if info.confirmations.is_zero() {
            self.count = self.count.saturating_add(1);
        } else {
            self.count = 0;
        }
    }

    /// Invoked when a new fetch cycle starts while we had bailed out.
    /// Gives the retry a full allowance of zero confirmation observations.
    pub fn reset_on_new_cycle(&mut self) {
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use magicblock_rpc_client::{BlockTimestamp, Confirmations};

    use super::*;

    fn info(confirmations: Confirmations) -> StatusInfo {
        StatusInfo {
            slot: 1,
            confirmations,
            confirmation_status: None,
            error: None,
            timestamp: BlockTimestamp::Unavailable,
        }
    }

    #[test]
    fn test_counts_consecutive_zero_confirmations() {
        let mut counter = ZeroConfirmationCounter::new(5);
        for expected in 1..=4 {
            counter.observe(&info(Confirmations::Count(0)));
            assert_eq!(counter.count(), expected);
            assert!(!counter.is_bailed_out());
        }
        counter.observe(&info(Confirmations::Count(0)));
        assert_eq!(counter.count(), 5);
        assert!(counter.is_bailed_out());
    }

    #[test]
    fn test_non_zero_confirmations_reset() {
        let mut counter = ZeroConfirmationCounter::new(5);
        counter.observe(&info(Confirmations::Count(0)));
        counter.observe(&info(Confirmations::Count(0)));
        counter.observe(&info(Confirmations::Count(0)));
        assert_eq!(counter.count(), 3);

        counter.observe(&info(Confirmations::Count(1)));
        assert_eq!(counter.count(), 0);

        counter.observe(&info(Confirmations::Count(0)));
        counter.observe(&info(Confirmations::Max));
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn test_reset_on_new_cycle_after_bailout() {
        let mut counter = ZeroConfirmationCounter::new(2);
        counter.observe(&info(Confirmations::Count(0)));
        counter.observe(&info(Confirmations::Count(0)));
        assert!(counter.is_bailed_out());

        counter.reset_on_new_cycle();
        assert_eq!(counter.count(), 0);
        assert!(!counter.is_bailed_out());
    }
}
