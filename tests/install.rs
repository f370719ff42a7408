//! Installation workflows against the scripted device

mod common;

use common::{executor, FakeDevice, TestContext};
use tdtk::common::config::DeviceLayout;
use tdtk::device::RemountStatus;
use tdtk::executor::Target;
use tdtk::install::Installer;
use tdtk::report::Reporter;

const APK: &str = "Launcher.apk";
const PRIVAPP: &str = "privapp-permissions-launcher.xml";
const DEFAULT: &str = "default-permissions-launcher.xml";

fn companions() -> Vec<String> {
    vec![PRIVAPP.to_string(), DEFAULT.to_string()]
}

fn context() -> TestContext {
    let ctx = TestContext::new();
    ctx.file(APK).file(PRIVAPP).file(DEFAULT);
    ctx
}

#[tokio::test]
async fn test_fresh_privileged_install() {
    let ctx = context();
    let device = FakeDevice::new();
    let layout = DeviceLayout::default();
    let reporter = Reporter::default();
    let installer = Installer::new(&device, &layout, &ctx.files_dir, &reporter);

    assert!(installer.install_privileged(APK, &companions(), false).await.unwrap());

    assert!(device.has_file("/product/etc/permissions/privapp-permissions-launcher.xml"));
    assert!(device.has_file("/product/etc/default-permissions/default-permissions-launcher.xml"));
    assert!(device.has_file("/product/priv-app/Launcher/Launcher.apk"));

    // Only the package directory is created
    assert_eq!(
        device.calls_starting_with("mkdir"),
        vec!["mkdir /product/priv-app/Launcher 755"]
    );
    // Every move is followed by an ownership fix-up
    let calls = device.calls();
    for (i, call) in calls.iter().enumerate() {
        if call.starts_with("mv ") {
            let destination = call.rsplit(' ').next().unwrap();
            assert_eq!(calls[i + 1], format!("chown {} root:root 644", destination));
        }
    }
    assert_eq!(device.calls_starting_with("push").len(), 3);
}

#[tokio::test]
async fn test_privileged_install_is_idempotent() {
    let ctx = context();
    let device = FakeDevice::new();
    device
        .add_file("/product/etc/permissions/privapp-permissions-launcher.xml")
        .add_file("/product/etc/default-permissions/default-permissions-launcher.xml")
        .add_file("/product/priv-app/Launcher/Launcher.apk");
    let layout = DeviceLayout::default();
    let reporter = Reporter::default();
    let installer = Installer::new(&device, &layout, &ctx.files_dir, &reporter);

    assert!(installer.install_privileged(APK, &companions(), false).await.unwrap());

    assert!(device.calls_starting_with("mv").is_empty());
    assert!(device.calls_starting_with("mkdir").is_empty());
}

#[tokio::test]
async fn test_partially_installed_moves_only_missing() {
    let ctx = context();
    let device = FakeDevice::new();
    device.add_file("/product/etc/permissions/privapp-permissions-launcher.xml");
    let layout = DeviceLayout::default();
    let reporter = Reporter::default();
    let installer = Installer::new(&device, &layout, &ctx.files_dir, &reporter);

    assert!(installer.install_privileged(APK, &companions(), false).await.unwrap());

    assert_eq!(
        device.calls_starting_with("mv"),
        vec![
            "mv /sdcard/TDTK/default-permissions-launcher.xml /product/etc/default-permissions/default-permissions-launcher.xml",
            "mv /sdcard/TDTK/Launcher.apk /product/priv-app/Launcher/Launcher.apk",
        ]
    );
}

#[tokio::test]
async fn test_overwrite_moves_everything() {
    let ctx = context();
    let device = FakeDevice::new();
    device
        .add_file("/product/etc/permissions/privapp-permissions-launcher.xml")
        .add_file("/product/priv-app/Launcher/Launcher.apk");
    let layout = DeviceLayout::default();
    let reporter = Reporter::default();
    let installer = Installer::new(&device, &layout, &ctx.files_dir, &reporter);

    assert!(installer.install_privileged(APK, &companions(), true).await.unwrap());

    assert_eq!(device.calls_starting_with("mv").len(), 3);
    assert!(device.calls_starting_with("exists").is_empty());
}

#[tokio::test]
async fn test_first_failure_short_circuits() {
    let ctx = context();
    let device = FakeDevice::new();
    device.fail_move_to("/product/etc/permissions/privapp-permissions-launcher.xml");
    let layout = DeviceLayout::default();
    let reporter = Reporter::default();
    let installer = Installer::new(&device, &layout, &ctx.files_dir, &reporter);

    assert!(!installer.install_privileged(APK, &companions(), false).await.unwrap());

    assert_eq!(device.calls_starting_with("mv").len(), 1);
    assert!(device.calls_starting_with("chown").is_empty());
    assert!(!device.has_file("/product/priv-app/Launcher/Launcher.apk"));
}

#[tokio::test]
async fn test_missing_local_file_fails_staging() {
    let ctx = TestContext::new();
    ctx.file(APK);
    let device = FakeDevice::new();
    let layout = DeviceLayout::default();
    let reporter = Reporter::default();
    let installer = Installer::new(&device, &layout, &ctx.files_dir, &reporter);

    assert!(!installer.install_privileged(APK, &companions(), false).await.unwrap());
    assert!(device.calls_starting_with("mv").is_empty());
}

#[tokio::test]
async fn test_refused_root_stops_before_staging() {
    let ctx = context();
    let device = FakeDevice::new().refusing_root();
    let layout = DeviceLayout::default();
    let reporter = Reporter::default();
    let installer = Installer::new(&device, &layout, &ctx.files_dir, &reporter);

    assert!(!installer.install_privileged(APK, &companions(), false).await.unwrap());
    assert_eq!(device.calls(), vec!["root"]);
}

#[tokio::test]
async fn test_remount_retries_once_after_elevation() {
    let ctx = context();
    let device = FakeDevice::new();
    device.remounts(vec![RemountStatus::NeedsRoot, RemountStatus::Remounted]);
    let layout = DeviceLayout::default();
    let reporter = Reporter::default();
    let installer = Installer::new(&device, &layout, &ctx.files_dir, &reporter);

    assert!(installer.install_privileged(APK, &companions(), false).await.unwrap());
    assert_eq!(&device.calls()[..4], ["root", "remount", "root", "remount"]);
}

#[tokio::test]
async fn test_remount_gives_up_after_one_retry() {
    let ctx = context();
    let device = FakeDevice::new();
    device.remounts(vec![RemountStatus::NeedsRoot, RemountStatus::NeedsRoot]);
    let layout = DeviceLayout::default();
    let reporter = Reporter::default();
    let installer = Installer::new(&device, &layout, &ctx.files_dir, &reporter);

    assert!(!installer.install_privileged(APK, &companions(), false).await.unwrap());
    assert_eq!(device.calls(), vec!["root", "remount", "root", "remount"]);
}

#[tokio::test]
async fn test_inaccessible_partition_fails() {
    let ctx = context();
    let device = FakeDevice::new();
    device.remounts(vec![RemountStatus::Inaccessible]);
    let layout = DeviceLayout::default();
    let reporter = Reporter::default();
    let installer = Installer::new(&device, &layout, &ctx.files_dir, &reporter);

    assert!(!installer.install_app(APK).await.unwrap());
    assert!(device.calls_starting_with("install").is_empty());
}

#[tokio::test]
async fn test_install_app_submodule() {
    let ctx = context();
    ctx.module(
        "apps.json",
        r#"{"launcher": {"type": "install-app", "expected": "", "files": ["Launcher.apk"]}}"#,
    );
    let device = FakeDevice::new();

    let summary = executor(&ctx, &device)
        .run(Target::Module("apps.launcher".into()))
        .await;

    assert_eq!(summary.passed, 1);
    assert_eq!(device.calls_starting_with("install").len(), 1);
}

#[tokio::test]
async fn test_push_and_execute_submodule() {
    let ctx = TestContext::new();
    ctx.file("collect.sh").module(
        "tools.json",
        r#"{"collect": {"type": "push-exec", "command": "/data/local/tmp/collect.sh", "expected": 0, "files": ["collect.sh"]}}"#,
    );
    let device = FakeDevice::new();

    let summary = executor(&ctx, &device)
        .run(Target::Module("tools.collect".into()))
        .await;

    assert_eq!(summary.passed, 1);
    assert!(device.has_file("/data/local/tmp/collect.sh"));
    let shells = device.calls_starting_with("shell");
    assert_eq!(
        shells,
        vec![
            "shell chmod 755 /data/local/tmp/collect.sh",
            "shell /data/local/tmp/collect.sh",
        ]
    );
}

#[tokio::test]
async fn test_privileged_submodule_through_plan() {
    let ctx = context();
    ctx.module(
        "apps/launcher.json",
        r#"{"install": {
            "type": "app-install-priv",
            "expected": "",
            "files": ["Launcher.apk", "privapp-permissions-launcher.xml", "default-permissions-launcher.xml"]
        }}"#,
    );
    let plan = ctx.plan(r#"[{"test_name": "Install launcher", "module": "apps.launcher.install"}]"#);
    let device = FakeDevice::new();

    let summary = executor(&ctx, &device).run(Target::Plan(plan)).await;

    assert_eq!(summary.passed, 1);
    assert!(device.has_file("/product/priv-app/Launcher/Launcher.apk"));
    assert_eq!(device.calls().last().map(String::as_str), Some("rm /sdcard/TDTK"));
}
