//! Registry lifecycle as chain history.
//!
//! The registry's audit sink lands on the node's own ledger here, so
//! every transition must finalize as a Page before it takes effect.
//! Tampering with that history afterward is pinpointed by the
//! full-chain walk, and endorsements from recalled seats stop counting
//! the moment the recall finalizes.

#[cfg(test)]
mod tests {
    use crate::integration::harness::{
        council, council_with, finalize_entry, no_rollups, SharedPageStore, AUDIT_SUBMITTER,
        DAY_MS, T0,
    };
    use cl_01_signer::{SignerApi, SignerKeypair};
    use cl_02_registry::{RegistryApi, RegistryError, TermBounds};
    use cl_03_ledger::adapters::InMemoryRollupStore;
    use cl_03_ledger::{HistoryFilter, LedgerApi};
    use serde_json::json;
    use shared_types::{
        AuthorizationError, FinalizedBlock, IntegrityError, LedgerFault, Page, PageState, Tier,
        TimeSource, ValidatorId, ValidatorRole,
    };

    fn term() -> TermBounds {
        TermBounds { start: T0 - DAY_MS, until: T0 + 365 * DAY_MS }
    }

    #[tokio::test]
    async fn test_lifecycle_transitions_land_as_finalized_pages() {
        let node = council(5, 5).await;
        let keypair = SignerKeypair::from_seed(&[40; 32]);
        let archivist = ValidatorId::new("archivist-0");

        node.registry
            .register(archivist.clone(), keypair.public_key(), ValidatorRole::Secretary, term())
            .await
            .unwrap();
        node.clock.advance(1_000);
        node.registry
            .deactivate(&archivist, "left office mid-term")
            .await
            .unwrap();

        let trail = node
            .ledger
            .read_history(&HistoryFilter::all().submitter(AUDIT_SUBMITTER))
            .unwrap();
        let actions: Vec<&str> = trail.iter().map(|p| p.action.as_str()).collect();
        assert_eq!(actions, ["validator.registered", "validator.deactivated"]);
        assert!(trail.iter().all(|p| p.state == PageState::Finalized));
        assert_eq!(trail[0].payload["identity"], "archivist-0");
        assert_eq!(trail[0].payload["role"], "secretary");
        assert_eq!(trail[1].payload["reason"], "left office mid-term");

        // The in-memory registry agrees with what the chain recorded.
        assert!(node.registry.info(&archivist).is_some_and(|i| !i.eligible_now));
        assert_eq!(node.registry.active_validators().len(), 5);
    }

    #[tokio::test]
    async fn test_ineligible_claim_changes_neither_store() {
        let node = council(5, 5).await;
        let before = node.ledger.tip().unwrap();
        let keypair = SignerKeypair::from_seed(&[41; 32]);
        let visitor = ValidatorId::new("visitor-0");

        let refused = node
            .registry
            .register(visitor.clone(), keypair.public_key(), ValidatorRole::Observer, term())
            .await;

        assert!(matches!(
            refused,
            Err(RegistryError::Authorization(AuthorizationError::RoleNeverEligible { .. }))
        ));
        assert!(node.registry.info(&visitor).is_none());
        assert_eq!(node.registry.active_validators().len(), 5);
        assert_eq!(node.ledger.tip().unwrap(), before, "no audit Page for a refused claim");
    }

    #[tokio::test]
    async fn test_tampered_page_is_pinpointed_by_the_walk() {
        let pages = SharedPageStore::new();
        let node = council_with(
            5,
            5,
            no_rollups(),
            Box::new(pages.clone()),
            Box::new(InMemoryRollupStore::new()),
        )
        .await;

        for session in 1..=42u64 {
            node.clock.advance(1_000);
            finalize_entry(&node, "minutes.approved", json!({"session": session})).await;
        }
        assert_eq!(node.ledger.tip().unwrap().height, 43);
        assert!(node.ledger.validate_chain().unwrap().ok);

        pages.rewrite(42, |page| {
            page.payload = json!({"session": 42, "amended": "quietly"});
        });

        let report = node.ledger.validate_chain().unwrap();
        assert!(!report.ok);
        let divergence = report.first_divergence.expect("divergence report");
        assert_eq!(divergence.tier, Tier::Page);
        assert_eq!(divergence.index, 42);
        assert!(matches!(divergence.fault, IntegrityError::HashMismatch { .. }));
    }

    #[tokio::test]
    async fn test_recalled_seat_endorsements_stop_counting() {
        let node = council(5, 5).await;
        finalize_entry(&node, "minutes.approved", json!({"session": 1})).await;

        node.clock.advance(DAY_MS);
        node.registry
            .deactivate(&ValidatorId::new("seat-0"), "recall vote")
            .await
            .unwrap();

        // History keeps verifying: the early Pages are judged by their own
        // era, when seat-0 still counted.
        assert!(node.ledger.validate_chain().unwrap().ok);

        // A new block leaning on seat-0 falls short: four seats remain, so
        // quorum is three, and the recalled endorsement is discounted.
        node.clock.advance(1_000);
        let tip = node.ledger.tip().unwrap();
        let prior = node.ledger.page_at(tip.height - 1).unwrap().unwrap();
        let mut forged = Page::draft(
            tip.height,
            prior.hash,
            "minutes.approved",
            json!({"session": 99}),
            "clerk-office",
            node.clock.now_ms(),
        )
        .unwrap();
        forged.signatures = vec![
            node.signers[0].sign_block(Tier::Page, &forged.hash),
            node.signers[1].sign_block(Tier::Page, &forged.hash),
            node.signers[2].sign_block(Tier::Page, &forged.hash),
        ];
        forged.state = PageState::Finalized;

        let refused = node.ledger.accept_external(FinalizedBlock::Page(forged));
        assert!(matches!(
            refused,
            Err(LedgerFault::Integrity(IntegrityError::InsufficientQuorum { .. }))
        ));
        assert_eq!(node.ledger.tip().unwrap().height, tip.height);
    }
}
