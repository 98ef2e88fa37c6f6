use anyhow::Context;

use super::*;

const MANIFEST: &str = r#"
# vendor descriptor
[Unity]
title=Unity 5.3.2p1
url=MacEditorInstaller/Unity-5.3.2p1.pkg
install=true
size=1234567
installedsize=4567890
md5=ABCDEF0123456789ABCDEF0123456789

[Documentation]
url=MacDocumentationInstaller/Documentation-5.3.2p1.pkg
install=false
size=300000
installedsize=900000

[WebGL]
URL: MacEditorTargetInstaller/UnitySetup-WebGL-Support-for-Editor-5.3.2p1.pkg
Install: 1
Size: 1000
InstalledSize: 2000
; trailing comment
"#;

fn version(input: &str) -> UnityVersion {
    UnityVersion::parse(input).expect("version must parse")
}

fn names(selection: &[PackageDescriptor]) -> Vec<&str> {
    selection.iter().map(|package| package.name.as_str()).collect()
}

#[test]
fn parse_full_version() {
    let parsed = version("5.3.2p1");
    assert_eq!(parsed.major, 5);
    assert_eq!(parsed.minor, Some(3));
    assert_eq!(parsed.patch, Some(2));
    assert_eq!(parsed.stage, Some(ReleaseStage::Patch));
    assert_eq!(parsed.stage_number, Some(1));
    assert!(parsed.is_concrete());
}

#[test]
fn parse_partial_version_leaves_wildcards() {
    let parsed = version("5.3");
    assert_eq!(parsed.minor, Some(3));
    assert_eq!(parsed.patch, None);
    assert_eq!(parsed.stage, None);
    assert_eq!(parsed.stage_number, None);
    assert!(!parsed.is_concrete());

    let staged = version("5.3.5b");
    assert_eq!(staged.stage, Some(ReleaseStage::Beta));
    assert_eq!(staged.stage_number, None);
}

#[test]
fn format_renders_wildcards_with_placeholder() {
    assert_eq!(version("5.3").to_string(), "5.3.xxx");
    assert_eq!(version("2017.1.0b").to_string(), "2017.1.0bx");
    assert_eq!(version("5.3.2p1").to_string(), "5.3.2p1");
}

#[test]
fn formatted_version_parses_back_to_equal_value() {
    for raw in ["5", "5.3", "5.3.2", "5.3.2p", "5.3.2p1", "2018.4.36f1"] {
        let parsed = version(raw);
        let reparsed = version(&parsed.to_string());
        assert_eq!(parsed, reparsed, "round trip of {raw}");
    }
}

#[test]
fn parse_rejects_malformed_versions() {
    for raw in ["", "abc", "5.3.2q1", "5.3.2p1z", "x.3", "5..3"] {
        let err = UnityVersion::parse(raw).expect_err("malformed version must fail");
        assert!(
            matches!(classify(&err), Some(UnisetupError::Format { .. })),
            "{raw} should be a format error"
        );
    }
}

#[test]
fn ordering_uses_stage_strength_not_letter() {
    let mut versions = vec![
        version("5.3.1f1"),
        version("5.3.0b1"),
        version("5.3.0p1"),
        version("5.3.0f1"),
        version("5.3.0a1"),
    ];
    versions.sort();
    let rendered: Vec<String> = versions.iter().map(ToString::to_string).collect();
    assert_eq!(
        rendered,
        vec!["5.3.0f1", "5.3.0p1", "5.3.0b1", "5.3.0a1", "5.3.1f1"]
    );
}

#[test]
fn unset_fields_sort_lowest() {
    assert!(version("5.3") < version("5.3.0f1"));
    assert!(version("5.3.0") < version("5.3.0f1"));
    assert!(version("5.3.0f") < version("5.3.0f1"));
    assert_eq!(version("5.3.0"), version("5.3.0f"));
}

#[test]
fn ordering_is_antisymmetric_and_transitive() {
    let samples: Vec<UnityVersion> = ["5", "5.3", "5.3.0f1", "5.3.0p2", "5.3.5b1", "2017.1.0a3"]
        .iter()
        .map(|raw| version(raw))
        .collect();
    for a in &samples {
        for b in &samples {
            assert_eq!(a.cmp(b), b.cmp(a).reverse());
            for c in &samples {
                if a < b && b < c {
                    assert!(a < c);
                }
            }
        }
    }
}

#[test]
fn unspecified_stage_matches_final_and_patch_only() {
    let spec = version("5.3");
    assert!(spec.matches(&version("5.3.0f1")));
    assert!(spec.matches(&version("5.3.2p1")));
    assert!(!spec.matches(&version("5.3.5b1")));
    assert!(!spec.matches(&version("5.4.0f1")));
}

#[test]
fn explicit_stage_is_a_ceiling() {
    let beta = version("5.3.5b");
    assert!(beta.matches(&version("5.3.5b1")));
    assert!(beta.matches(&version("5.3.5f1")));
    assert!(!beta.matches(&version("5.3.5a1")));

    let final_only = version("5.3.2f");
    assert!(final_only.matches(&version("5.3.2f3")));
    assert!(!final_only.matches(&version("5.3.2p1")));
}

#[test]
fn concrete_version_matches_itself() {
    for raw in ["5.3.0f1", "5.3.2p1", "5.3.5b1", "2017.1.0a3"] {
        let concrete = version(raw);
        assert!(concrete.matches(&concrete), "{raw} must match itself");
    }
}

#[test]
fn release_stage_parses_listing_names() {
    assert_eq!(ReleaseStage::parse("release"), Some(ReleaseStage::Final));
    assert_eq!(ReleaseStage::parse("Patch"), Some(ReleaseStage::Patch));
    assert_eq!(ReleaseStage::parse("b"), Some(ReleaseStage::Beta));
    assert_eq!(ReleaseStage::parse("all"), Some(ReleaseStage::Alpha));
    assert_eq!(ReleaseStage::parse("nightly"), None);
    assert!(ReleaseStage::Final.strength() < ReleaseStage::Alpha.strength());
}

#[test]
fn sort_version_strings_drops_garbage_and_duplicates() {
    let sorted = sort_version_strings(["5.3.2p1", "_lastupdate", "5.3.0f1", "5.3.0f1", "5.2.4f1"]);
    assert_eq!(sorted, vec!["5.2.4f1", "5.3.0f1", "5.3.2p1"]);
}

#[test]
fn parse_manifest_sections() {
    let manifest = PackageManifest::from_ini_str(MANIFEST).expect("manifest must parse");
    assert_eq!(names(manifest.packages()), vec!["Unity", "Documentation", "WebGL"]);

    let unity = manifest.get("unity").expect("lookup must ignore case");
    assert_eq!(unity.remote_path, "MacEditorInstaller/Unity-5.3.2p1.pkg");
    assert_eq!(unity.file_name(), "Unity-5.3.2p1.pkg");
    assert_eq!(unity.size_bytes, 1_234_567);
    assert_eq!(unity.installed_size_bytes, 4_567_890);
    assert_eq!(
        unity.md5.as_deref(),
        Some("abcdef0123456789abcdef0123456789")
    );
    assert!(unity.install_by_default);

    let docs = manifest.get("Documentation").expect("docs must exist");
    assert_eq!(docs.md5, None);
    assert!(!docs.install_by_default);

    let webgl = manifest.get("WEBGL").expect("colon separated keys must parse");
    assert_eq!(webgl.size_bytes, 1000);
    assert!(webgl.install_by_default);
}

#[test]
fn manifest_value_keeps_delimiters_after_the_first() {
    let raw = "[Unity]\nurl: MacEditorInstaller/Unity.pkg?a=b\nsize=1\ninstalledsize: 2\ninstall=true\n\
               md5 = 0123456789abcdef0123456789abcdef\n";
    let manifest = PackageManifest::from_ini_str(raw).expect("mixed delimiters must parse");

    let unity = manifest.get("Unity").expect("unity must exist");
    assert_eq!(unity.remote_path, "MacEditorInstaller/Unity.pkg?a=b");
    assert_eq!(unity.installed_size_bytes, 2);
    assert_eq!(
        unity.md5.as_deref(),
        Some("0123456789abcdef0123456789abcdef")
    );
}

#[test]
fn manifest_missing_required_key_fails() {
    let raw = "[Unity]\nurl=Unity.pkg\nsize=1\ninstall=true\n";
    let err = PackageManifest::from_ini_str(raw).expect_err("installedsize is required");
    assert!(format!("{err:#}").contains("installedsize"));
}

#[test]
fn manifest_rejects_bad_values_and_duplicates() {
    let bad_bool = "[Unity]\nurl=Unity.pkg\nsize=1\ninstalledsize=1\ninstall=maybe\n";
    PackageManifest::from_ini_str(bad_bool).expect_err("install must be boolean");

    let bad_size = "[Unity]\nurl=Unity.pkg\nsize=-1\ninstalledsize=1\ninstall=true\n";
    PackageManifest::from_ini_str(bad_size).expect_err("size must be unsigned");

    let duplicate = "[A]\nurl=a\nsize=1\ninstalledsize=1\ninstall=1\n[A]\nurl=b\nsize=1\ninstalledsize=1\ninstall=1\n";
    let err = PackageManifest::from_ini_str(duplicate).expect_err("duplicate sections must fail");
    assert!(format!("{err:#}").contains("duplicate section"));

    let orphan = "url=a\n";
    PackageManifest::from_ini_str(orphan).expect_err("keys need a section");
}

#[test]
fn select_defaults_and_all() {
    let manifest = PackageManifest::from_ini_str(MANIFEST).expect("manifest must parse");
    assert_eq!(names(&manifest.select(&[], false)), vec!["Unity", "WebGL"]);
    assert_eq!(
        names(&manifest.select(&[], true)),
        vec!["Unity", "Documentation", "WebGL"]
    );
}

#[test]
fn select_requested_moves_main_package_first() {
    let manifest = PackageManifest::from_ini_str(MANIFEST).expect("manifest must parse");
    let requested = vec![
        "webgl".to_string(),
        "Missing".to_string(),
        "UNITY".to_string(),
        "WebGL".to_string(),
    ];
    let selection = manifest.select(&requested, false);
    assert_eq!(names(&selection), vec!["Unity", "WebGL"]);
}

#[test]
fn selection_totals() {
    let manifest = PackageManifest::from_ini_str(MANIFEST).expect("manifest must parse");
    let selection = manifest.select(&[], false);
    assert_eq!(total_download_size(&selection), 1_235_567);
    assert_eq!(total_installed_size(&selection), 4_569_890);
}

#[test]
fn manifest_file_name_is_derived_from_version() {
    assert_eq!(manifest_file_name("5.3.2p1"), "unity-5.3.2p1-osx.ini");
}

#[test]
fn format_size_uses_binary_units() {
    assert_eq!(format_size(0), "0 B");
    assert_eq!(format_size(512), "512 B");
    assert_eq!(format_size(1024), "1.00 KB");
    assert_eq!(format_size(1536), "1.50 KB");
    assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.00 GB");
}

#[test]
fn error_exit_codes_survive_context() {
    let err = anyhow::Error::from(UnisetupError::NoMatch {
        spec: "5.3.xxx".to_string(),
    });
    let wrapped = Err::<(), _>(err)
        .context("failed to resolve versions")
        .expect_err("must stay an error");
    let classified = classify(&wrapped).expect("taxonomy must be found in the chain");
    assert_eq!(classified.exit_code(), 3);
    assert_eq!(UnisetupError::conflict("x").exit_code(), 8);
    assert_eq!(UnisetupError::fetch("http://a", "timeout").exit_code(), 4);
}
