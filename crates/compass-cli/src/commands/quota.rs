//! The `compass quota` and `compass new-test` commands.

use anyhow::{Context, Result};

use compass_core::model::{ClusterQuota, Test};
use compass_core::traits::{NewTest, TaxonomyStore};

use super::{GlobalOpts, Workspace};

/// Parse `CLUSTER` or `CLUSTER:P:R:SDB`.
///
/// A bare cluster id means "every active question"; in the long form an
/// empty count is left unset (`2:3::1`).
pub fn parse_quota_spec(spec: &str) -> Result<ClusterQuota> {
    let parts: Vec<&str> = spec.split(':').collect();
    let cluster_id = parts[0]
        .trim()
        .parse::<u64>()
        .with_context(|| format!("invalid cluster id in quota spec: {spec}"))?;

    match parts.len() {
        1 => Ok(ClusterQuota::unrestricted(cluster_id)),
        4 => {
            let count = |raw: &str| -> Result<Option<u32>> {
                let raw = raw.trim();
                if raw.is_empty() {
                    return Ok(None);
                }
                raw.parse::<u32>()
                    .map(Some)
                    .with_context(|| format!("invalid count {raw:?} in quota spec: {spec}"))
            };
            Ok(ClusterQuota {
                cluster_id,
                p_count: count(parts[1])?,
                r_count: count(parts[2])?,
                sdb_count: count(parts[3])?,
            })
        }
        _ => anyhow::bail!("quota spec must be CLUSTER or CLUSTER:P:R:SDB, got: {spec}"),
    }
}

fn print_quotas(test: &Test) {
    println!("Test {}: {}", test.id, test.title);
    if test.clusters.is_empty() {
        println!("  (no clusters attached)");
    }
    let show = |n: Option<u32>| n.map(|n| n.to_string()).unwrap_or_else(|| "-".into());
    for q in &test.clusters {
        println!(
            "  cluster {}: P={} R={} SDB={}",
            q.cluster_id,
            show(q.p_count),
            show(q.r_count),
            show(q.sdb_count)
        );
    }
}

/// Attach, update or detach cluster quotas of a test.
///
/// The assembled list is left alone; run `compass assemble` to apply the change.
pub async fn execute(
    opts: &GlobalOpts,
    test_id: u64,
    set: Vec<String>,
    detach: Vec<u64>,
) -> Result<()> {
    let workspace = Workspace::open(opts)?;
    let store = &workspace.store;

    let mut test = store
        .test(test_id)
        .await?
        .with_context(|| format!("test {test_id} not found"))?;

    for spec in &set {
        let quota = parse_quota_spec(spec)?;
        test = if test.quota_for(quota.cluster_id).is_some() {
            store.set_cluster_quota(test_id, quota).await?
        } else {
            store.attach_cluster(test_id, quota).await?
        };
    }
    if !detach.is_empty() {
        test = store.detach_clusters(test_id, &detach).await?;
    }

    if !set.is_empty() || !detach.is_empty() {
        workspace.save()?;
        tracing::info!(test_id, attached = test.clusters.len(), "quotas updated");
    }

    print_quotas(&test);
    if !set.is_empty() || !detach.is_empty() {
        println!("\nRun `compass assemble --test {test_id}` to regenerate its questions.");
    }
    Ok(())
}

/// Create a test; when clusters are attached it is assembled right away.
pub async fn create(
    opts: &GlobalOpts,
    title: String,
    description: Option<String>,
    inactive: bool,
    clusters: Vec<String>,
) -> Result<()> {
    let workspace = Workspace::open(opts)?;

    let clusters = clusters
        .iter()
        .map(|spec| parse_quota_spec(spec))
        .collect::<Result<Vec<_>>>()?;
    let (test, report) = workspace
        .assembler()
        .on_test_created(NewTest {
            title,
            description,
            is_active: !inactive,
            clusters,
        })
        .await?;
    workspace.save()?;

    println!("Created test {}: {}", test.id, test.title);
    match report {
        Some(report) => super::import::print_assembly_table(&[report]),
        None => println!("No clusters attached; nothing assembled yet."),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_cluster_is_unrestricted() {
        let quota = parse_quota_spec("7").unwrap();
        assert_eq!(quota, ClusterQuota::unrestricted(7));
    }

    #[test]
    fn full_spec_with_gaps() {
        let quota = parse_quota_spec("2:3::1").unwrap();
        assert_eq!(quota.cluster_id, 2);
        assert_eq!(quota.p_count, Some(3));
        assert_eq!(quota.r_count, None);
        assert_eq!(quota.sdb_count, Some(1));
    }

    #[test]
    fn malformed_specs_are_rejected() {
        assert!(parse_quota_spec("x").is_err());
        assert!(parse_quota_spec("1:2").is_err());
        assert!(parse_quota_spec("1:a:0:0").is_err());
        assert!(parse_quota_spec("1:-1:0:0").is_err());
    }
}
