#[cfg(test)]
mod session_tests {
    use crate::core::ports::{
        CaptureError, CapturePeripheral, Clock, LinkResult, ManagerError, ManagerSession,
        NetworkConnector, SleepArmError, TimeSyncError, UpdateOutcome, WakeSleepControl,
    };
    use crate::core::schedule::{RemoteConfig, SchedulePolicy, SleepPlan, TargetTime};
    use crate::core::session::{run_session, DeviceIdentity};
    use crate::core::status::DeviceStatus;
    use crate::core::wake_reason::{TriggerLevel, WakeReason};

    // 2024-01-01 00:00:00 UTC
    const NOW_MS: i64 = 1_704_067_200_000;
    const DEFAULT_MS: u64 = 86_400_000;
    const FALLBACK_MS: u64 = 300_000;

    fn policy(target: Option<TargetTime>) -> SchedulePolicy {
        SchedulePolicy {
            timezone: chrono_tz::UTC,
            target_time_of_day: target,
            default_sleep_ms: DEFAULT_MS,
            fallback_sleep_ms: FALLBACK_MS,
        }
    }

    fn identity() -> DeviceIdentity {
        DeviceIdentity {
            device_id: "cam-test".to_string(),
            device_password: "secret".to_string(),
        }
    }

    enum CameraBehavior {
        Succeed(Vec<u8>),
        Fail,
    }

    struct MockCamera {
        behavior: CameraBehavior,
        calls: u32,
    }

    impl MockCamera {
        fn succeeding(bytes: usize) -> Self {
            Self {
                behavior: CameraBehavior::Succeed(vec![0xA5; bytes]),
                calls: 0,
            }
        }

        fn failing() -> Self {
            Self {
                behavior: CameraBehavior::Fail,
                calls: 0,
            }
        }
    }

    impl CapturePeripheral for MockCamera {
        fn capture_image(&mut self) -> Result<Vec<u8>, CaptureError> {
            self.calls += 1;
            match &self.behavior {
                CameraBehavior::Succeed(bytes) => Ok(bytes.clone()),
                CameraBehavior::Fail => Err(CaptureError::Capture("mock failure".to_string())),
            }
        }
    }

    struct MockNetwork {
        connected: bool,
        allow_flags: Vec<bool>,
        shutdown_calls: u32,
    }

    impl MockNetwork {
        fn up() -> Self {
            Self {
                connected: true,
                allow_flags: Vec::new(),
                shutdown_calls: 0,
            }
        }

        fn down() -> Self {
            Self {
                connected: false,
                allow_flags: Vec::new(),
                shutdown_calls: 0,
            }
        }
    }

    impl NetworkConnector for MockNetwork {
        fn connect(&mut self, allow_interactive_setup: bool) -> LinkResult {
            self.allow_flags.push(allow_interactive_setup);
            if self.connected {
                LinkResult::Connected {
                    ip: "192.168.1.20".to_string(),
                }
            } else {
                LinkResult::Failed {
                    cause: "mock link down".to_string(),
                }
            }
        }

        fn shutdown(&mut self) {
            self.shutdown_calls += 1;
        }
    }

    struct MockClock {
        now_ms: i64,
        sync_ok: bool,
        sync_calls: u32,
    }

    impl MockClock {
        fn at(now_ms: i64) -> Self {
            Self {
                now_ms,
                sync_ok: true,
                sync_calls: 0,
            }
        }
    }

    impl Clock for MockClock {
        fn now_epoch_ms(&self) -> i64 {
            self.now_ms
        }

        fn sync(&mut self) -> Result<(), TimeSyncError> {
            self.sync_calls += 1;
            if self.sync_ok {
                Ok(())
            } else {
                Err(TimeSyncError::Timeout)
            }
        }
    }

    struct MockManager {
        auth_ok: bool,
        discover_ok: bool,
        upload_ok: bool,
        status_ok: bool,
        update_ok: bool,
        remote_config: Option<RemoteConfig>,
        auth_calls: u32,
        discover_calls: u32,
        config_calls: u32,
        update_calls: u32,
        upload_sizes: Vec<usize>,
        statuses: Vec<DeviceStatus>,
    }

    impl MockManager {
        fn healthy(remote_config: Option<RemoteConfig>) -> Self {
            Self {
                auth_ok: true,
                discover_ok: true,
                upload_ok: true,
                status_ok: true,
                update_ok: true,
                remote_config,
                auth_calls: 0,
                discover_calls: 0,
                config_calls: 0,
                update_calls: 0,
                upload_sizes: Vec::new(),
                statuses: Vec::new(),
            }
        }
    }

    impl ManagerSession for MockManager {
        fn authenticate(
            &mut self,
            _device_id: &str,
            _device_password: &str,
        ) -> Result<(), ManagerError> {
            self.auth_calls += 1;
            if self.auth_ok {
                Ok(())
            } else {
                Err(ManagerError::Auth("mock auth rejection".to_string()))
            }
        }

        fn discover(&mut self) -> Result<(), ManagerError> {
            self.discover_calls += 1;
            if self.discover_ok {
                Ok(())
            } else {
                Err(ManagerError::Discovery("mock discovery failure".to_string()))
            }
        }

        fn upload_artifact(&mut self, image: &[u8]) -> Result<String, ManagerError> {
            self.upload_sizes.push(image.len());
            if self.upload_ok {
                Ok("ack-1".to_string())
            } else {
                Err(ManagerError::Upload("mock upload failure".to_string()))
            }
        }

        fn fetch_config(&mut self) -> Result<RemoteConfig, ManagerError> {
            self.config_calls += 1;
            self.remote_config
                .clone()
                .ok_or_else(|| ManagerError::Config("mock config failure".to_string()))
        }

        fn report_status(&mut self, status: &DeviceStatus) -> Result<(), ManagerError> {
            self.statuses.push(status.clone());
            if self.status_ok {
                Ok(())
            } else {
                Err(ManagerError::Status("mock status failure".to_string()))
            }
        }

        fn check_and_apply_update(
            &mut self,
            _current_version: &str,
        ) -> Result<UpdateOutcome, ManagerError> {
            self.update_calls += 1;
            if self.update_ok {
                Ok(UpdateOutcome::UpToDate)
            } else {
                Err(ManagerError::Update("mock update failure".to_string()))
            }
        }
    }

    struct MockSleep {
        arm_ok: bool,
        arm_calls: u32,
        committed_timer_ms: Option<Option<u64>>,
    }

    impl MockSleep {
        fn new() -> Self {
            Self {
                arm_ok: true,
                arm_calls: 0,
                committed_timer_ms: None,
            }
        }
    }

    impl WakeSleepControl for MockSleep {
        fn arm_external_trigger(&mut self) -> Result<(), SleepArmError> {
            self.arm_calls += 1;
            if self.arm_ok {
                Ok(())
            } else {
                Err(SleepArmError::Ext0(-1))
            }
        }

        fn deep_sleep(&mut self, timer_duration_ms: Option<u64>) {
            assert!(
                self.committed_timer_ms.is_none(),
                "deep_sleep committed twice"
            );
            self.committed_timer_ms = Some(timer_duration_ms);
        }
    }

    fn run(
        reason: WakeReason,
        target: Option<TargetTime>,
        camera: &mut MockCamera,
        network: &mut MockNetwork,
        manager: &mut MockManager,
        sleep: &mut MockSleep,
    ) -> SleepPlan {
        let mut clock = MockClock::at(NOW_MS);
        run_session(
            identity(),
            "0.3.0",
            &policy(target),
            reason,
            camera,
            network,
            &mut clock,
            manager,
            sleep,
        )
    }

    #[test]
    fn test_non_trigger_wakes_never_capture() {
        for reason in [
            WakeReason::ColdBoot,
            WakeReason::TimerExpired,
            WakeReason::Unknown(5),
        ] {
            let mut camera = MockCamera::succeeding(1024);
            let mut network = MockNetwork::up();
            let mut manager = MockManager::healthy(Some(RemoteConfig::default()));
            let mut sleep = MockSleep::new();

            run(reason, None, &mut camera, &mut network, &mut manager, &mut sleep);

            assert_eq!(camera.calls, 0, "reason={:?}", reason);
            assert!(manager.upload_sizes.is_empty());
        }
    }

    #[test]
    fn test_timer_session_reports_status_and_checks_update() {
        // エンドツーエンド・シナリオA: タイマー起床 + リモート起床時刻
        let mut camera = MockCamera::succeeding(1024);
        let mut network = MockNetwork::up();
        let mut manager = MockManager::healthy(Some(RemoteConfig {
            next_wakeup_time_ms: Some(NOW_MS + 3_600_000),
        }));
        let mut sleep = MockSleep::new();

        let plan = run(
            WakeReason::TimerExpired,
            None,
            &mut camera,
            &mut network,
            &mut manager,
            &mut sleep,
        );

        assert!(manager.upload_sizes.is_empty()); // アップロードなし
        assert_eq!(manager.statuses.len(), 1); // ステータス報告あり
        assert_eq!(manager.update_calls, 1); // 更新チェックあり
        assert_eq!(plan, SleepPlan::UntilAbsoluteTime(NOW_MS + 3_600_000));
        assert_eq!(sleep.committed_timer_ms, Some(Some(3_600_000)));
        assert_eq!(sleep.arm_calls, 1);
    }

    #[test]
    fn test_trigger_session_uploads_without_update_check() {
        // エンドツーエンド・シナリオB: 外部トリガー起床 + キャプチャ成功
        let mut camera = MockCamera::succeeding(4096);
        let mut network = MockNetwork::up();
        let mut manager = MockManager::healthy(Some(RemoteConfig::default()));
        let mut sleep = MockSleep::new();

        let plan = run(
            WakeReason::ExternalTrigger(TriggerLevel::Low),
            None,
            &mut camera,
            &mut network,
            &mut manager,
            &mut sleep,
        );

        assert_eq!(camera.calls, 1);
        assert_eq!(manager.upload_sizes, vec![4096]);
        assert_eq!(manager.update_calls, 0); // トリガー起床は更新チェックなし
        assert_eq!(sleep.arm_calls, 1); // トリガー再arm
        assert_eq!(plan, SleepPlan::FixedDuration(DEFAULT_MS));
    }

    #[test]
    fn test_trigger_capture_failure_still_reports_status() {
        let mut camera = MockCamera::failing();
        let mut network = MockNetwork::up();
        let mut manager = MockManager::healthy(Some(RemoteConfig::default()));
        let mut sleep = MockSleep::new();

        run(
            WakeReason::ExternalTrigger(TriggerLevel::Low),
            None,
            &mut camera,
            &mut network,
            &mut manager,
            &mut sleep,
        );

        // 画像なしでもステータス報告はちょうど1回行われ、劣化メッセージが載る
        assert!(manager.upload_sizes.is_empty());
        assert_eq!(manager.statuses.len(), 1);
        let message = manager.statuses[0].message.as_deref().unwrap();
        assert!(message.contains("capture failed"), "message={}", message);

        // トリガーはarmされ、スリープは必ずコミットされる
        assert_eq!(sleep.arm_calls, 1);
        assert!(sleep.committed_timer_ms.is_some());
    }

    #[test]
    fn test_link_failure_seals_with_fallback() {
        let mut camera = MockCamera::succeeding(1024);
        let mut network = MockNetwork::down();
        let mut manager = MockManager::healthy(None);
        let mut sleep = MockSleep::new();

        let plan = run(
            WakeReason::TimerExpired,
            None,
            &mut camera,
            &mut network,
            &mut manager,
            &mut sleep,
        );

        // リモート操作には一切進まず、短いフォールバックでスリープする
        assert_eq!(manager.auth_calls, 0);
        assert_eq!(plan, SleepPlan::FixedDuration(FALLBACK_MS));
        assert_eq!(sleep.committed_timer_ms, Some(Some(FALLBACK_MS)));
        assert_eq!(sleep.arm_calls, 1);
        assert_eq!(network.shutdown_calls, 1);
    }

    #[test]
    fn test_auth_failure_seals_with_fallback() {
        let mut camera = MockCamera::succeeding(1024);
        let mut network = MockNetwork::up();
        let mut manager = MockManager::healthy(None);
        manager.auth_ok = false;
        let mut sleep = MockSleep::new();

        let plan = run(
            WakeReason::TimerExpired,
            None,
            &mut camera,
            &mut network,
            &mut manager,
            &mut sleep,
        );

        assert_eq!(manager.discover_calls, 0);
        assert!(manager.statuses.is_empty());
        assert_eq!(plan, SleepPlan::FixedDuration(FALLBACK_MS));
        assert_eq!(sleep.arm_calls, 1);
    }

    #[test]
    fn test_discovery_failure_seals_with_fallback() {
        let mut camera = MockCamera::succeeding(1024);
        let mut network = MockNetwork::up();
        let mut manager = MockManager::healthy(None);
        manager.discover_ok = false;
        let mut sleep = MockSleep::new();

        let plan = run(
            WakeReason::TimerExpired,
            None,
            &mut camera,
            &mut network,
            &mut manager,
            &mut sleep,
        );

        assert!(manager.statuses.is_empty());
        assert_eq!(plan, SleepPlan::FixedDuration(FALLBACK_MS));
        assert_eq!(sleep.committed_timer_ms, Some(Some(FALLBACK_MS)));
    }

    #[test]
    fn test_portal_only_allowed_for_non_trigger_wakes() {
        let mut camera = MockCamera::succeeding(1024);
        let mut network = MockNetwork::up();
        let mut manager = MockManager::healthy(Some(RemoteConfig::default()));
        let mut sleep = MockSleep::new();
        run(
            WakeReason::ExternalTrigger(TriggerLevel::Low),
            None,
            &mut camera,
            &mut network,
            &mut manager,
            &mut sleep,
        );
        assert_eq!(network.allow_flags, vec![false]);

        let mut camera = MockCamera::succeeding(1024);
        let mut network = MockNetwork::up();
        let mut manager = MockManager::healthy(Some(RemoteConfig::default()));
        let mut sleep = MockSleep::new();
        run(
            WakeReason::TimerExpired,
            None,
            &mut camera,
            &mut network,
            &mut manager,
            &mut sleep,
        );
        assert_eq!(network.allow_flags, vec![true]);
    }

    #[test]
    fn test_unknown_reason_behaves_like_timer_wake() {
        let mut camera = MockCamera::succeeding(1024);
        let mut network = MockNetwork::up();
        let mut manager = MockManager::healthy(Some(RemoteConfig::default()));
        let mut sleep = MockSleep::new();

        run(
            WakeReason::Unknown(7),
            None,
            &mut camera,
            &mut network,
            &mut manager,
            &mut sleep,
        );

        assert_eq!(camera.calls, 0);
        assert_eq!(manager.update_calls, 1);
        assert_eq!(manager.statuses.len(), 1);
        assert_eq!(manager.statuses[0].last_wakeup_reason, "unknown(7)");
    }

    #[test]
    fn test_config_fetch_failure_degrades_to_local_policy() {
        let mut camera = MockCamera::succeeding(1024);
        let mut network = MockNetwork::up();
        let mut manager = MockManager::healthy(None); // fetch_config は失敗する
        let mut sleep = MockSleep::new();

        // NOW_MS は 00:00:00 UTC。目標 07:30 なら 7.5 時間後。
        let plan = run(
            WakeReason::TimerExpired,
            Some(TargetTime { hour: 7, minute: 30 }),
            &mut camera,
            &mut network,
            &mut manager,
            &mut sleep,
        );

        assert_eq!(manager.config_calls, 1);
        assert_eq!(plan, SleepPlan::FixedDuration(27_000_000));
        // 設定取得失敗はセッションを中断しない
        assert_eq!(manager.statuses.len(), 1);
    }

    #[test]
    fn test_isolated_action_failures_do_not_abort_session() {
        // アップロード・更新・ステータスが全て失敗してもセッションは
        // スリープコミットまで到達する
        let mut camera = MockCamera::succeeding(2048);
        let mut network = MockNetwork::up();
        let mut manager = MockManager::healthy(Some(RemoteConfig::default()));
        manager.upload_ok = false;
        manager.status_ok = false;
        let mut sleep = MockSleep::new();

        run(
            WakeReason::ExternalTrigger(TriggerLevel::Low),
            None,
            &mut camera,
            &mut network,
            &mut manager,
            &mut sleep,
        );
        assert_eq!(manager.upload_sizes, vec![2048]);
        assert_eq!(manager.statuses.len(), 1);
        assert!(sleep.committed_timer_ms.is_some());

        let mut camera = MockCamera::succeeding(2048);
        let mut network = MockNetwork::up();
        let mut manager = MockManager::healthy(Some(RemoteConfig::default()));
        manager.update_ok = false;
        manager.status_ok = false;
        let mut sleep = MockSleep::new();

        run(
            WakeReason::TimerExpired,
            None,
            &mut camera,
            &mut network,
            &mut manager,
            &mut sleep,
        );
        assert_eq!(manager.update_calls, 1);
        assert_eq!(manager.config_calls, 1);
        assert_eq!(manager.statuses.len(), 1);
        assert!(sleep.committed_timer_ms.is_some());
    }

    #[test]
    fn test_status_report_content() {
        let mut camera = MockCamera::succeeding(1024);
        let mut network = MockNetwork::up();
        let mut manager = MockManager::healthy(Some(RemoteConfig::default()));
        let mut sleep = MockSleep::new();

        run(
            WakeReason::TimerExpired,
            None,
            &mut camera,
            &mut network,
            &mut manager,
            &mut sleep,
        );

        let status = &manager.statuses[0];
        assert_eq!(status.last_wakeup_time, NOW_MS / 1_000);
        assert_eq!(status.last_wakeup_reason, "timer");
        assert_eq!(status.version, "0.3.0");
        assert_eq!(status.status.as_deref(), Some("sleeping"));
        assert_eq!(status.message, None);
    }

    #[test]
    fn test_device_status_wire_format() {
        let status = DeviceStatus::sleeping(1_704_067_200, "timer".to_string(), "0.3.0", None);
        let value: serde_json::Value = serde_json::to_value(&status).unwrap();

        assert_eq!(value["last_wakeup_time"], 1_704_067_200i64);
        assert_eq!(value["last_wakeup_reason"], "timer");
        assert_eq!(value["version"], "0.3.0");
        assert_eq!(value["status"], "sleeping");
        // 省略可能フィールドはキーごと出さない
        assert!(value.get("message").is_none());
    }

    #[test]
    fn test_arm_failure_still_commits_sleep() {
        let mut camera = MockCamera::succeeding(1024);
        let mut network = MockNetwork::up();
        let mut manager = MockManager::healthy(Some(RemoteConfig::default()));
        let mut sleep = MockSleep::new();
        sleep.arm_ok = false;

        run(
            WakeReason::TimerExpired,
            None,
            &mut camera,
            &mut network,
            &mut manager,
            &mut sleep,
        );

        assert_eq!(sleep.arm_calls, 1);
        // armに失敗してもタイマー付きでスリープはコミットされる
        assert_eq!(sleep.committed_timer_ms, Some(Some(DEFAULT_MS)));
    }

    #[test]
    fn test_link_is_released_before_sleep_on_happy_path() {
        let mut camera = MockCamera::succeeding(1024);
        let mut network = MockNetwork::up();
        let mut manager = MockManager::healthy(Some(RemoteConfig::default()));
        let mut sleep = MockSleep::new();

        run(
            WakeReason::TimerExpired,
            None,
            &mut camera,
            &mut network,
            &mut manager,
            &mut sleep,
        );

        assert_eq!(network.shutdown_calls, 1);
    }
}
