//! Command handler tests. Relocated from the lib's inline test module to an
//! integration test so the shared test doubles in vmforge-test-support link
//! against the same vmforge_request crate instance (avoids duplicate-crate
//! trait mismatches from the dev-dependency cycle).

    use chrono::{DateTime, TimeZone, Utc};
    use uuid::Uuid;
    use vmforge_core::error::DomainError;
    use vmforge_core::repository::StoredEvent;

    use vmforge_request::application::command_handlers::{
        RequestServices, handle_approve_request, handle_cancel_request, handle_create_request,
        handle_mark_provisioning, handle_record_provisioned, handle_record_provisioning_failed,
        handle_reject_request,
    };
    use vmforge_request::domain::commands::{
        ApproveVmRequest, CancelVmRequest, CreateVmRequest, MarkProvisioning, RecordProvisioned,
        RecordProvisioningFailed, RejectVmRequest,
    };
    use vmforge_request::domain::events::{
        ProvisioningStarted, RequestApproved, RequestCreated, RequestEventKind, RequestRejected,
    };
    use vmforge_request::application::ports::AlwaysAllow;
    use vmforge_test_support::{
        ConflictingEventRepository, DenyAllQuota, FailingEventRepository, FailingNotifier,
        FailingProjectionStore, FailingTimeline, FixedClock, RecordingEventRepository,
        RecordingNotifier, RecordingProjectionStore, RecordingTimeline,
    };

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap()
    }

    fn stored(
        request_id: Uuid,
        tenant_id: Uuid,
        sequence_number: i64,
        kind: &RequestEventKind,
    ) -> StoredEvent {
        StoredEvent {
            event_id: Uuid::new_v4(),
            aggregate_id: request_id,
            event_type: kind.type_name().to_owned(),
            payload: serde_json::to_value(kind).unwrap(),
            sequence_number,
            tenant_id,
            actor_id: Uuid::new_v4(),
            correlation_id: Uuid::new_v4(),
            causation_id: Uuid::new_v4(),
            occurred_at: fixed_now(),
        }
    }

    fn created_event(request_id: Uuid, tenant_id: Uuid, requester_id: Uuid) -> StoredEvent {
        stored(
            request_id,
            tenant_id,
            1,
            &RequestEventKind::RequestCreated(RequestCreated {
                request_id,
                tenant_id,
                requester_id,
                project_id: Uuid::new_v4(),
                vm_name: "build-agent-01".to_owned(),
                size: "M".to_owned(),
                justification: "CI capacity".to_owned(),
                requester_email: Some("dev@example.com".to_owned()),
            }),
        )
    }

    fn approved_event(request_id: Uuid, tenant_id: Uuid, approver_id: Uuid) -> StoredEvent {
        stored(
            request_id,
            tenant_id,
            2,
            &RequestEventKind::RequestApproved(RequestApproved {
                request_id,
                approved_by: approver_id,
            }),
        )
    }

    fn provisioning_event(request_id: Uuid, tenant_id: Uuid) -> StoredEvent {
        stored(
            request_id,
            tenant_id,
            3,
            &RequestEventKind::ProvisioningStarted(ProvisioningStarted { request_id }),
        )
    }

    struct Doubles {
        clock: FixedClock,
        projections: RecordingProjectionStore,
        notifier: RecordingNotifier,
        timeline: RecordingTimeline,
        quota: AlwaysAllow,
    }

    impl Doubles {
        fn new() -> Self {
            Self {
                clock: FixedClock(fixed_now()),
                projections: RecordingProjectionStore::new(),
                notifier: RecordingNotifier::new(),
                timeline: RecordingTimeline::new(),
                quota: AlwaysAllow,
            }
        }

        fn services<'a>(
            &'a self,
            repo: &'a dyn vmforge_core::repository::EventRepository,
        ) -> RequestServices<'a> {
            RequestServices {
                clock: &self.clock,
                repo,
                projections: &self.projections,
                notifier: &self.notifier,
                timeline: &self.timeline,
                quota: &self.quota,
            }
        }
    }

    fn create_command(tenant_id: Uuid, requester_id: Uuid) -> CreateVmRequest {
        CreateVmRequest {
            correlation_id: Uuid::new_v4(),
            tenant_id,
            requester_id,
            project_id: Uuid::new_v4(),
            vm_name: "build-agent-01".to_owned(),
            size: "M".to_owned(),
            justification: "CI capacity".to_owned(),
            requester_email: "dev@example.com".to_owned(),
        }
    }

    // --- create ---

    #[tokio::test]
    async fn test_handle_create_request_persists_created_event() {
        // Arrange
        let tenant_id = Uuid::new_v4();
        let requester_id = Uuid::new_v4();
        let repo = RecordingEventRepository::new(Ok(Vec::new()));
        let doubles = Doubles::new();
        let command = create_command(tenant_id, requester_id);

        // Act
        let result = handle_create_request(&command, &doubles.services(&repo)).await;

        // Assert
        let cmd_result = result.unwrap();
        assert_eq!(cmd_result.stored_events.len(), 1);

        let appended = repo.appended_events();
        assert_eq!(appended.len(), 1);

        let (agg_id, expected_version, events) = &appended[0];
        assert_eq!(*agg_id, cmd_result.aggregate_id);
        assert_eq!(*expected_version, 0);
        assert_eq!(events.len(), 1);

        let stored = &events[0];
        assert_eq!(stored.event_type, "request.created");
        assert_eq!(stored.sequence_number, 1);
        assert_eq!(stored.tenant_id, tenant_id);
        assert_eq!(stored.actor_id, requester_id);
        assert_eq!(stored.correlation_id, command.correlation_id);
        assert_eq!(stored.occurred_at, fixed_now());
    }

    #[tokio::test]
    async fn test_handle_create_request_inserts_pending_projection_row() {
        // Arrange
        let tenant_id = Uuid::new_v4();
        let repo = RecordingEventRepository::new(Ok(Vec::new()));
        let doubles = Doubles::new();
        let command = create_command(tenant_id, Uuid::new_v4());

        // Act
        let result = handle_create_request(&command, &doubles.services(&repo))
            .await
            .unwrap();

        // Assert
        let inserted = doubles.projections.inserted();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].request_id, result.aggregate_id);
        assert_eq!(inserted[0].tenant_id, tenant_id);
        assert_eq!(inserted[0].status, "PENDING");
        assert_eq!(inserted[0].version, 1);
        assert_eq!(inserted[0].requested_at, fixed_now());
    }

    #[tokio::test]
    async fn test_handle_create_request_sends_created_notification() {
        // Arrange
        let repo = RecordingEventRepository::new(Ok(Vec::new()));
        let doubles = Doubles::new();
        let command = create_command(Uuid::new_v4(), Uuid::new_v4());

        // Act
        let result = handle_create_request(&command, &doubles.services(&repo))
            .await
            .unwrap();

        // Assert
        let created = doubles.notifier.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].recipient.as_str(), "dev@example.com");
        assert_eq!(created[0].request_id, result.aggregate_id);
    }

    #[tokio::test]
    async fn test_handle_create_request_quota_rejection_short_circuits() {
        // Arrange
        let repo = RecordingEventRepository::new(Ok(Vec::new()));
        let doubles = Doubles::new();
        let quota = DenyAllQuota("project vm quota reached".to_owned());
        let services = RequestServices {
            quota: &quota,
            ..doubles.services(&repo)
        };
        let command = create_command(Uuid::new_v4(), Uuid::new_v4());

        // Act
        let result = handle_create_request(&command, &services).await;

        // Assert — no event, no projection, no notification.
        assert!(matches!(
            result.unwrap_err(),
            DomainError::QuotaExceeded(_)
        ));
        assert!(repo.appended_events().is_empty());
        assert!(doubles.projections.inserted().is_empty());
        assert!(doubles.notifier.created().is_empty());
    }

    #[tokio::test]
    async fn test_handle_create_request_with_unparseable_email_succeeds_without_notification() {
        // Arrange
        let repo = RecordingEventRepository::new(Ok(Vec::new()));
        let doubles = Doubles::new();
        let mut command = create_command(Uuid::new_v4(), Uuid::new_v4());
        command.requester_email = "not-an-email".to_owned();

        // Act
        let result = handle_create_request(&command, &doubles.services(&repo)).await;

        // Assert
        result.unwrap();
        assert_eq!(repo.appended_events().len(), 1);
        assert!(doubles.notifier.created().is_empty());
    }

    #[tokio::test]
    async fn test_handle_create_request_rejects_empty_vm_name() {
        // Arrange
        let repo = RecordingEventRepository::new(Ok(Vec::new()));
        let doubles = Doubles::new();
        let mut command = create_command(Uuid::new_v4(), Uuid::new_v4());
        command.vm_name = "   ".to_owned();

        // Act
        let result = handle_create_request(&command, &doubles.services(&repo)).await;

        // Assert
        assert!(matches!(result.unwrap_err(), DomainError::Validation(_)));
        assert!(repo.appended_events().is_empty());
    }

    #[tokio::test]
    async fn test_handle_create_request_survives_failing_side_effects() {
        // Arrange
        let repo = RecordingEventRepository::new(Ok(Vec::new()));
        let doubles = Doubles::new();
        let projections = FailingProjectionStore;
        let notifier = FailingNotifier;
        let services = RequestServices {
            projections: &projections,
            notifier: &notifier,
            ..doubles.services(&repo)
        };
        let command = create_command(Uuid::new_v4(), Uuid::new_v4());

        // Act
        let result = handle_create_request(&command, &services).await;

        // Assert — the command still succeeds; the event stream is truth.
        let cmd_result = result.unwrap();
        assert_eq!(cmd_result.stored_events.len(), 1);
        assert_eq!(repo.appended_events().len(), 1);
    }

    #[tokio::test]
    async fn test_handle_create_request_surfaces_persistence_failure() {
        // Arrange
        let repo = FailingEventRepository;
        let doubles = Doubles::new();
        let command = create_command(Uuid::new_v4(), Uuid::new_v4());

        // Act
        let result = handle_create_request(&command, &doubles.services(&repo)).await;

        // Assert — store failure is not a concurrency conflict.
        assert!(matches!(
            result.unwrap_err(),
            DomainError::Infrastructure(_)
        ));
        assert!(doubles.projections.inserted().is_empty());
        assert!(doubles.notifier.created().is_empty());
    }

    // --- cancel ---

    #[tokio::test]
    async fn test_handle_cancel_request_persists_cancelled_event() {
        // Arrange
        let request_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        let requester_id = Uuid::new_v4();
        let repo = RecordingEventRepository::new(Ok(vec![created_event(
            request_id,
            tenant_id,
            requester_id,
        )]));
        let doubles = Doubles::new();
        let command = CancelVmRequest {
            correlation_id: Uuid::new_v4(),
            tenant_id,
            actor_id: requester_id,
            request_id,
            reason: Some("no longer needed".to_owned()),
        };

        // Act
        let result = handle_cancel_request(&command, &doubles.services(&repo)).await;

        // Assert
        let cmd_result = result.unwrap();
        assert_eq!(cmd_result.stored_events.len(), 1);

        let appended = repo.appended_events();
        assert_eq!(appended.len(), 1);
        let (agg_id, expected_version, events) = &appended[0];
        assert_eq!(*agg_id, request_id);
        assert_eq!(*expected_version, 1);
        assert_eq!(events[0].event_type, "request.cancelled");
        assert_eq!(events[0].sequence_number, 2);

        let updates = doubles.projections.status_updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].status, "CANCELLED");
    }

    #[tokio::test]
    async fn test_handle_cancel_request_by_non_owner_returns_forbidden() {
        // Arrange
        let request_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        let repo = RecordingEventRepository::new(Ok(vec![created_event(
            request_id,
            tenant_id,
            Uuid::new_v4(),
        )]));
        let doubles = Doubles::new();
        let command = CancelVmRequest {
            correlation_id: Uuid::new_v4(),
            tenant_id,
            actor_id: Uuid::new_v4(),
            request_id,
            reason: None,
        };

        // Act
        let result = handle_cancel_request(&command, &doubles.services(&repo)).await;

        // Assert — Forbidden, and append was never called.
        assert!(matches!(result.unwrap_err(), DomainError::Forbidden(_)));
        assert!(repo.appended_events().is_empty());
        assert!(doubles.projections.status_updates().is_empty());
    }

    #[tokio::test]
    async fn test_handle_cancel_request_is_idempotent_when_already_cancelled() {
        // Arrange
        let request_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        let requester_id = Uuid::new_v4();
        let cancelled = stored(
            request_id,
            tenant_id,
            2,
            &RequestEventKind::RequestCancelled(vmforge_request::domain::events::RequestCancelled {
                request_id,
                reason: None,
            }),
        );
        let repo = RecordingEventRepository::new(Ok(vec![
            created_event(request_id, tenant_id, requester_id),
            cancelled,
        ]));
        let doubles = Doubles::new();
        let command = CancelVmRequest {
            correlation_id: Uuid::new_v4(),
            tenant_id,
            actor_id: requester_id,
            request_id,
            reason: None,
        };

        // Act
        let result = handle_cancel_request(&command, &doubles.services(&repo)).await;

        // Assert — success with zero new events and no side effects.
        let cmd_result = result.unwrap();
        assert!(cmd_result.stored_events.is_empty());
        assert!(repo.appended_events().is_empty());
        assert!(doubles.projections.status_updates().is_empty());
    }

    #[tokio::test]
    async fn test_handle_cancel_request_unknown_id_returns_not_found() {
        // Arrange
        let request_id = Uuid::new_v4();
        let repo = RecordingEventRepository::new(Ok(Vec::new()));
        let doubles = Doubles::new();
        let command = CancelVmRequest {
            correlation_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            actor_id: Uuid::new_v4(),
            request_id,
            reason: None,
        };

        // Act
        let result = handle_cancel_request(&command, &doubles.services(&repo)).await;

        // Assert
        match result.unwrap_err() {
            DomainError::AggregateNotFound(id) => assert_eq!(id, request_id),
            other => panic!("expected AggregateNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_handle_cancel_request_after_rejection_returns_invalid_state() {
        // Arrange — spec scenario: rejected request, then cancel.
        let request_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        let requester_id = Uuid::new_v4();
        let rejected = stored(
            request_id,
            tenant_id,
            2,
            &RequestEventKind::RequestRejected(RequestRejected {
                request_id,
                rejected_by: Uuid::new_v4(),
                reason: "insufficient quota".to_owned(),
            }),
        );
        let repo = RecordingEventRepository::new(Ok(vec![
            created_event(request_id, tenant_id, requester_id),
            rejected,
        ]));
        let doubles = Doubles::new();
        let command = CancelVmRequest {
            correlation_id: Uuid::new_v4(),
            tenant_id,
            actor_id: requester_id,
            request_id,
            reason: None,
        };

        // Act
        let result = handle_cancel_request(&command, &doubles.services(&repo)).await;

        // Assert
        match result.unwrap_err() {
            DomainError::InvalidState { current } => assert_eq!(current, "REJECTED"),
            other => panic!("expected InvalidState, got {other:?}"),
        }
        assert!(repo.appended_events().is_empty());
    }

    // --- approve / reject ---

    #[tokio::test]
    async fn test_handle_approve_request_updates_projection_and_notifies() {
        // Arrange
        let request_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        let approver_id = Uuid::new_v4();
        let repo = RecordingEventRepository::new(Ok(vec![created_event(
            request_id,
            tenant_id,
            Uuid::new_v4(),
        )]));
        let doubles = Doubles::new();
        let command = ApproveVmRequest {
            correlation_id: Uuid::new_v4(),
            tenant_id,
            approver_id,
            request_id,
        };

        // Act
        let result = handle_approve_request(&command, &doubles.services(&repo)).await;

        // Assert
        let cmd_result = result.unwrap();
        assert_eq!(cmd_result.stored_events.len(), 1);
        assert_eq!(cmd_result.stored_events[0].event_type, "request.approved");
        assert_eq!(cmd_result.stored_events[0].sequence_number, 2);

        let updates = doubles.projections.status_updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].status, "APPROVED");
        assert_eq!(updates[0].approved_by, Some(approver_id));

        let notifications = doubles.notifier.approved();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].request_id, request_id);
    }

    #[tokio::test]
    async fn test_handle_approve_request_surfaces_concurrency_conflict() {
        // Arrange — another writer always wins the race.
        let request_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        let repo = ConflictingEventRepository::new(vec![created_event(
            request_id,
            tenant_id,
            Uuid::new_v4(),
        )]);
        let doubles = Doubles::new();
        let command = ApproveVmRequest {
            correlation_id: Uuid::new_v4(),
            tenant_id,
            approver_id: Uuid::new_v4(),
            request_id,
        };

        // Act
        let result = handle_approve_request(&command, &doubles.services(&repo)).await;

        // Assert — the conflict surfaces untouched; no retry, no side effects.
        match result.unwrap_err() {
            DomainError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual,
            } => {
                assert_eq!(aggregate_id, request_id);
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("expected ConcurrencyConflict, got {other:?}"),
        }
        assert!(doubles.projections.status_updates().is_empty());
        assert!(doubles.notifier.approved().is_empty());
    }

    #[tokio::test]
    async fn test_handle_reject_request_records_reason_everywhere() {
        // Arrange
        let request_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        let approver_id = Uuid::new_v4();
        let repo = RecordingEventRepository::new(Ok(vec![created_event(
            request_id,
            tenant_id,
            Uuid::new_v4(),
        )]));
        let doubles = Doubles::new();
        let command = RejectVmRequest {
            correlation_id: Uuid::new_v4(),
            tenant_id,
            approver_id,
            request_id,
            reason: "insufficient quota".to_owned(),
        };

        // Act
        let result = handle_reject_request(&command, &doubles.services(&repo)).await;

        // Assert
        let cmd_result = result.unwrap();
        assert_eq!(cmd_result.stored_events.len(), 1);
        assert_eq!(cmd_result.stored_events[0].event_type, "request.rejected");

        let updates = doubles.projections.status_updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].status, "REJECTED");
        assert_eq!(
            updates[0].rejection_reason.as_deref(),
            Some("insufficient quota")
        );

        let notifications = doubles.notifier.rejected();
        assert_eq!(notifications.len(), 1);
        assert_eq!(
            notifications[0].reason.as_deref(),
            Some("insufficient quota")
        );
    }

    // --- mark provisioning ---

    #[tokio::test]
    async fn test_handle_mark_provisioning_from_approved_succeeds() {
        // Arrange
        let request_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        let repo = RecordingEventRepository::new(Ok(vec![
            created_event(request_id, tenant_id, Uuid::new_v4()),
            approved_event(request_id, tenant_id, Uuid::new_v4()),
        ]));
        let doubles = Doubles::new();
        let command = MarkProvisioning {
            correlation_id: Uuid::new_v4(),
            tenant_id,
            actor_id: Uuid::new_v4(),
            request_id,
        };

        // Act
        let result = handle_mark_provisioning(&command, &doubles.services(&repo)).await;

        // Assert
        let cmd_result = result.unwrap();
        assert_eq!(cmd_result.stored_events.len(), 1);
        assert_eq!(
            cmd_result.stored_events[0].event_type,
            "request.provisioning_started"
        );
        assert_eq!(cmd_result.stored_events[0].sequence_number, 3);

        let updates = doubles.projections.status_updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].status, "PROVISIONING");

        let entries = doubles.timeline.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, tenant_id);
        assert_eq!(entries[0].1, request_id);
        assert_eq!(entries[0].2, "provisioning started");
    }

    #[tokio::test]
    async fn test_handle_mark_provisioning_outside_approved_never_appends() {
        // Arrange — request is still PENDING.
        let request_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        let repo = RecordingEventRepository::new(Ok(vec![created_event(
            request_id,
            tenant_id,
            Uuid::new_v4(),
        )]));
        let doubles = Doubles::new();
        let command = MarkProvisioning {
            correlation_id: Uuid::new_v4(),
            tenant_id,
            actor_id: Uuid::new_v4(),
            request_id,
        };

        // Act
        let result = handle_mark_provisioning(&command, &doubles.services(&repo)).await;

        // Assert
        match result.unwrap_err() {
            DomainError::InvalidState { current } => assert_eq!(current, "PENDING"),
            other => panic!("expected InvalidState, got {other:?}"),
        }
        assert!(repo.appended_events().is_empty());
        assert!(doubles.timeline.entries().is_empty());
    }

    #[tokio::test]
    async fn test_handle_mark_provisioning_tenant_mismatch_reports_not_found() {
        // Arrange — the aggregate exists under a different tenant.
        let request_id = Uuid::new_v4();
        let repo = RecordingEventRepository::new(Ok(vec![
            created_event(request_id, Uuid::new_v4(), Uuid::new_v4()),
            approved_event(request_id, Uuid::new_v4(), Uuid::new_v4()),
        ]));
        let doubles = Doubles::new();
        let command = MarkProvisioning {
            correlation_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            actor_id: Uuid::new_v4(),
            request_id,
        };

        // Act
        let result = handle_mark_provisioning(&command, &doubles.services(&repo)).await;

        // Assert — not found, not a tenant-revealing error.
        match result.unwrap_err() {
            DomainError::AggregateNotFound(id) => assert_eq!(id, request_id),
            other => panic!("expected AggregateNotFound, got {other:?}"),
        }
        assert!(repo.appended_events().is_empty());
    }

    #[tokio::test]
    async fn test_handle_mark_provisioning_survives_failing_timeline() {
        // Arrange
        let request_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        let repo = RecordingEventRepository::new(Ok(vec![
            created_event(request_id, tenant_id, Uuid::new_v4()),
            approved_event(request_id, tenant_id, Uuid::new_v4()),
        ]));
        let doubles = Doubles::new();
        let timeline = FailingTimeline;
        let services = RequestServices {
            timeline: &timeline,
            ..doubles.services(&repo)
        };
        let command = MarkProvisioning {
            correlation_id: Uuid::new_v4(),
            tenant_id,
            actor_id: Uuid::new_v4(),
            request_id,
        };

        // Act
        let result = handle_mark_provisioning(&command, &services).await;

        // Assert
        assert!(result.is_ok());
        assert_eq!(repo.appended_events().len(), 1);
    }

    // --- provisioning outcome ---

    #[tokio::test]
    async fn test_handle_record_provisioned_updates_vm_details() {
        // Arrange
        let request_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        let repo = RecordingEventRepository::new(Ok(vec![
            created_event(request_id, tenant_id, Uuid::new_v4()),
            approved_event(request_id, tenant_id, Uuid::new_v4()),
            provisioning_event(request_id, tenant_id),
        ]));
        let doubles = Doubles::new();
        let command = RecordProvisioned {
            correlation_id: Uuid::new_v4(),
            tenant_id,
            actor_id: Uuid::new_v4(),
            request_id,
            machine_id: "vm-4711".to_owned(),
            ip_address: Some("10.0.12.34".to_owned()),
            hostname: Some("build-agent-01".to_owned()),
            warning: None,
        };

        // Act
        let result = handle_record_provisioned(&command, &doubles.services(&repo)).await;

        // Assert
        let cmd_result = result.unwrap();
        assert_eq!(cmd_result.stored_events.len(), 1);
        assert_eq!(cmd_result.stored_events[0].event_type, "request.provisioned");
        assert_eq!(cmd_result.stored_events[0].sequence_number, 4);

        let status_updates = doubles.projections.status_updates();
        assert_eq!(status_updates.len(), 1);
        assert_eq!(status_updates[0].status, "READY");

        let vm_updates = doubles.projections.vm_updates();
        assert_eq!(vm_updates.len(), 1);
        assert_eq!(vm_updates[0].machine_id, "vm-4711");
        assert_eq!(vm_updates[0].ip_address.as_deref(), Some("10.0.12.34"));
    }

    #[tokio::test]
    async fn test_handle_record_provisioning_failed_captures_retry_data() {
        // Arrange
        let request_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        let repo = RecordingEventRepository::new(Ok(vec![
            created_event(request_id, tenant_id, Uuid::new_v4()),
            approved_event(request_id, tenant_id, Uuid::new_v4()),
            provisioning_event(request_id, tenant_id),
        ]));
        let doubles = Doubles::new();
        let command = RecordProvisioningFailed {
            correlation_id: Uuid::new_v4(),
            tenant_id,
            actor_id: Uuid::new_v4(),
            request_id,
            error: "cpu exhausted: requested 4, available 0".to_owned(),
            retriable: true,
            retry_count: 1,
            last_attempt_at: fixed_now(),
        };

        // Act
        let result = handle_record_provisioning_failed(&command, &doubles.services(&repo)).await;

        // Assert
        let cmd_result = result.unwrap();
        assert_eq!(cmd_result.stored_events.len(), 1);
        assert_eq!(
            cmd_result.stored_events[0].event_type,
            "request.provisioning_failed"
        );

        let updates = doubles.projections.status_updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].status, "FAILED");
    }
