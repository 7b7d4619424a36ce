/// ホストで実行する統合テストモジュール
///
/// テスト項目:
/// 1. スリープ計画の計算（定時起床・リモート設定・フォールバック）
/// 2. セッションオーケストレーターの分岐と終端保証
/// 3. 起床原因のマッピング
pub mod schedule_tests;
pub mod session_tests;
