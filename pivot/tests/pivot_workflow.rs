//! Workflow tests for `pull_and_rebase`.
//!
//! Every external tool is scripted with `ScriptedRunner`; the assertions are
//! on the exact commands the workflow issues and in which order.

use pivot::core::types::OSTREE_COMMIT_LABEL;
use pivot::pivot::pull_and_rebase;
use pivot::test_support::{
    COMMIT, DIGEST_A, DIGEST_B, ScriptedRunner, TestHost, assert_in_order, inspect_json,
    status_json,
};

const NAME: &str = "quay.io/openshift/os";

fn image_id(digest: &str) -> String {
    format!("{NAME}@{digest}")
}

fn origin(digest: &str) -> String {
    format!("pivot://{}", image_id(digest))
}

fn labelled_runner(previous: Option<&str>, digest: &str) -> ScriptedRunner {
    ScriptedRunner::new()
        .respond("rpm-ostree status", status_json(previous))
        .respond(
            "skopeo inspect",
            inspect_json(NAME, digest, &[(OSTREE_COMMIT_LABEL, COMMIT)]),
        )
        .respond("podman create", "c0ffee\n")
        .respond("podman mount", "/var/lib/containers/storage/overlay/m/merged\n")
}

#[test]
fn same_image_is_a_no_op() {
    let host = TestHost::new();
    let previous = origin(DIGEST_A);
    let runner = labelled_runner(Some(&previous), DIGEST_A);

    let result =
        pull_and_rebase(&runner, &host.config, &format!("{NAME}:latest")).expect("pivot");

    assert!(!result.changed);
    assert_eq!(result.image_id, image_id(DIGEST_A));
    assert!(!runner.called("podman"));
    assert!(!runner.called("rpm-ostree rebase"));
    assert!(!runner.called("ostree"));
}

#[test]
fn same_digest_under_another_name_is_a_no_op() {
    let host = TestHost::new();
    let previous = format!("pivot://registry.example.com/mirror/os@{DIGEST_A}");
    let runner = labelled_runner(Some(&previous), DIGEST_A);

    let result = pull_and_rebase(&runner, &host.config, NAME).expect("pivot");

    assert!(!result.changed);
    assert!(!runner.called("podman pull"));
}

#[test]
fn new_digest_pulls_and_rebases() {
    let host = TestHost::new();
    let previous = origin(DIGEST_A);
    let runner = labelled_runner(Some(&previous), DIGEST_B);

    let result =
        pull_and_rebase(&runner, &host.config, &format!("{NAME}:latest")).expect("pivot");

    assert!(result.changed);
    assert_eq!(result.image_id, image_id(DIGEST_B));
    let calls = runner.calls();
    assert_eq!(
        calls,
        vec![
            "rpm-ostree status --json".to_string(),
            format!("skopeo inspect docker://{NAME}:latest"),
            format!("podman pull {}", image_id(DIGEST_B)),
            "podman kill ostree-container-pivot".to_string(),
            "podman rm -f ostree-container-pivot".to_string(),
            format!(
                "podman create --net=none --name ostree-container-pivot {}",
                image_id(DIGEST_B)
            ),
            "podman mount c0ffee".to_string(),
            format!(
                "rpm-ostree rebase --experimental /var/lib/containers/storage/overlay/m/merged/srv/repo:{COMMIT} \
                 --custom-origin-url {} --custom-origin-description Managed by pivot tool",
                origin(DIGEST_B)
            ),
            "podman kill ostree-container-pivot".to_string(),
            "podman rm -f ostree-container-pivot".to_string(),
        ]
    );
}

#[test]
fn first_pivot_proceeds_without_comparison() {
    let host = TestHost::new();
    let runner = labelled_runner(None, DIGEST_A);

    let result = pull_and_rebase(&runner, &host.config, NAME).expect("pivot");

    assert!(result.changed);
    assert!(runner.called("rpm-ostree rebase"));
}

#[test]
fn foreign_origin_counts_as_no_previous_pivot() {
    let host = TestHost::new();
    let runner = labelled_runner(Some("https://mirror.example.com/os.ociarchive"), DIGEST_A);

    let result = pull_and_rebase(&runner, &host.config, NAME).expect("pivot");

    assert!(result.changed);
}

#[test]
fn non_canonical_previous_pivot_is_fatal() {
    let host = TestHost::new();
    let runner = labelled_runner(Some(&format!("pivot://{NAME}:latest")), DIGEST_A);

    let err = pull_and_rebase(&runner, &host.config, NAME).unwrap_err();

    assert!(format!("{err:#}").contains("parsing current image reference"));
    assert!(!runner.called("podman"));
}

#[test]
fn commit_falls_back_to_single_ref() {
    let host = TestHost::new();
    let runner = ScriptedRunner::new()
        .respond("rpm-ostree status", status_json(None))
        .respond("skopeo inspect", inspect_json(NAME, DIGEST_A, &[]))
        .respond("podman create", "c0ffee")
        .respond("podman mount", "/mnt/pivot")
        .respond("ostree refs", "rhcos/x86_64\n")
        .respond("ostree rev-parse", COMMIT);

    pull_and_rebase(&runner, &host.config, NAME).expect("pivot");

    let rebase = format!("rpm-ostree rebase --experimental /mnt/pivot/srv/repo:{COMMIT}");
    assert_in_order(
        &runner.calls(),
        &[
            "podman mount",
            "ostree refs --repo /mnt/pivot/srv/repo",
            "ostree rev-parse --repo /mnt/pivot/srv/repo rhcos/x86_64",
            rebase.as_str(),
            "podman rm -f ostree-container-pivot",
        ],
    );
}

#[test]
fn multiple_refs_fail_and_still_remove_helper() {
    let host = TestHost::new();
    let runner = ScriptedRunner::new()
        .respond("rpm-ostree status", status_json(None))
        .respond("skopeo inspect", inspect_json(NAME, DIGEST_A, &[]))
        .respond("podman create", "c0ffee")
        .respond("podman mount", "/mnt/pivot")
        .respond("ostree refs", "rhcos/x86_64\nfedora/x86_64\n");

    let err = pull_and_rebase(&runner, &host.config, NAME).unwrap_err();

    assert!(err.to_string().contains("multiple refs found in repo"));
    assert!(!runner.called("rpm-ostree rebase"));
    let mount = runner.position("podman mount").expect("mounted");
    let last_rm = runner
        .calls()
        .iter()
        .rposition(|call| call == "podman rm -f ostree-container-pivot")
        .expect("helper removed");
    assert!(last_rm > mount);
}

#[test]
fn empty_repository_fails() {
    let host = TestHost::new();
    let runner = ScriptedRunner::new()
        .respond("rpm-ostree status", status_json(None))
        .respond("skopeo inspect", inspect_json(NAME, DIGEST_A, &[]))
        .respond("podman create", "c0ffee")
        .respond("podman mount", "/mnt/pivot")
        .respond("ostree refs", "\n");

    let err = pull_and_rebase(&runner, &host.config, NAME).unwrap_err();

    assert!(err.to_string().contains("no refs found in repo"));
    assert_eq!(runner.count("podman rm -f"), 2);
}

#[test]
fn failed_rebase_removes_helper_and_propagates() {
    let host = TestHost::new();
    let runner = labelled_runner(None, DIGEST_A).fail("rpm-ostree rebase", "exit status: 1");

    let err = pull_and_rebase(&runner, &host.config, NAME).unwrap_err();

    assert!(format!("{err:#}").contains("failed to rebase"));
    assert_eq!(runner.count("rpm-ostree rebase"), 1);
    assert_eq!(runner.count("podman rm -f"), 2);
}

#[test]
fn flaky_inspect_is_retried() {
    let host = TestHost::new();
    let runner = ScriptedRunner::new()
        .respond("rpm-ostree status", status_json(None))
        .fail("skopeo inspect", "connection reset")
        .fail("skopeo inspect", "connection reset")
        .respond(
            "skopeo inspect",
            inspect_json(NAME, DIGEST_A, &[(OSTREE_COMMIT_LABEL, COMMIT)]),
        )
        .respond("podman create", "c0ffee")
        .respond("podman mount", "/mnt/pivot");

    let result = pull_and_rebase(&runner, &host.config, NAME).expect("pivot");

    assert!(result.changed);
    assert_eq!(runner.count("skopeo inspect"), 3);
}

#[test]
fn inspect_gives_up_after_max_attempts() {
    let mut host = TestHost::new();
    host.config.network.max_attempts = 3;
    let runner = ScriptedRunner::new()
        .respond("rpm-ostree status", status_json(None))
        .fail("skopeo inspect", "connection reset");

    let err = pull_and_rebase(&runner, &host.config, NAME).unwrap_err();

    assert!(format!("{err:#}").contains("giving up after 3 attempt(s)"));
    assert_eq!(runner.count("skopeo inspect"), 3);
    assert!(!runner.called("podman"));
}

#[test]
fn mount_is_never_retried() {
    let host = TestHost::new();
    let runner = ScriptedRunner::new()
        .respond("rpm-ostree status", status_json(None))
        .respond(
            "skopeo inspect",
            inspect_json(NAME, DIGEST_A, &[(OSTREE_COMMIT_LABEL, COMMIT)]),
        )
        .respond("podman create", "c0ffee")
        .fail("podman mount", "exit status: 125");

    let err = pull_and_rebase(&runner, &host.config, NAME).unwrap_err();

    assert!(err.to_string().contains("podman"));
    assert_eq!(runner.count("podman mount"), 1);
    assert!(!runner.called("rpm-ostree rebase"));
    assert_eq!(runner.count("podman rm -f"), 2);
}

#[test]
fn authfile_is_passed_when_present() {
    let host = TestHost::new();
    host.write(&host.config.paths.auth_file, "{}");
    let runner = labelled_runner(None, DIGEST_A);

    pull_and_rebase(&runner, &host.config, NAME).expect("pivot");

    let auth = host.config.paths.auth_file.display().to_string();
    assert!(runner.called(&format!("skopeo inspect --authfile {auth} docker://{NAME}")));
    assert!(runner.called(&format!("podman pull --authfile {auth} {}", image_id(DIGEST_A))));
}
