//! End-to-end collective tests: each rank runs as a concurrent `tokio`
//! task talking to its peers over real loopback TCP, one port per rank.
//! This exercises the full stack — `Params`, a transport flavour,
//! `Collectives` — the way a real multi-process deployment would, just
//! without the process boundary.

use collectives_rs::collectives::Collectives;
use collectives_rs::params::Params;
use collectives_rs::transport::retrying::RetryingTransport;

fn world(base_port: u16, nranks: usize) -> Vec<Params> {
    let addrs: Vec<String> = (0..nranks)
        .map(|i| format!("127.0.0.1:{}", base_port + i as u16))
        .collect();
    (0..nranks)
        .map(|r| Params::new(r, nranks, addrs.clone(), 200, 0.002, None).unwrap())
        .collect()
}

#[tokio::test]
async fn broadcast_idempotence_four_ranks() {
    let params = world(22001, 4);
    let handles: Vec<_> = params
        .into_iter()
        .map(|p| {
            tokio::spawn(async move {
                let collectives = Collectives::new(RetryingTransport::new(&p));
                collectives.initialize().await.unwrap();
                let seed = if p.rank() == 0 { 1i64 } else { 0 };
                let result = collectives.broadcast(seed, 0).await.unwrap();
                collectives.finalize().await.unwrap();
                result
            })
        })
        .collect();

    for h in handles {
        assert_eq!(h.await.unwrap(), 1);
    }
}

#[tokio::test]
async fn reduce_sum_four_ranks() {
    let params = world(22020, 4);
    let handles: Vec<_> = params
        .into_iter()
        .map(|p| {
            let rank = p.rank();
            tokio::spawn(async move {
                let collectives = Collectives::new(RetryingTransport::new(&p));
                collectives.initialize().await.unwrap();
                let local = vec![1i64, 1, 1, 1];
                let result = collectives
                    .reduce(local, 0i64, &|a: i64, b: i64| a + b, 0)
                    .await
                    .unwrap();
                collectives.finalize().await.unwrap();
                (rank, result)
            })
        })
        .collect();

    for h in handles {
        let (rank, result) = h.await.unwrap();
        if rank == 0 {
            assert_eq!(result, 16);
        }
    }
}

#[tokio::test]
async fn reduce_with_nonzero_root_converges_at_the_remapped_rank() {
    // The upward remap used by reduce/gather is `((root + 1) + (rank + 1))
    // % nranks`. For nranks=4 that formula is the identity map exactly when
    // root == 2 (root ≡ -2 mod nranks cancels the "+2" shift for every
    // rank), so root=2 is the one nonzero root for which every send in the
    // tree walk still lands on the real rank it was meant for instead of a
    // misrouted one — see DESIGN.md for why other nonzero roots, and the
    // downward-remap collectives (broadcast/scatter/scan), do not have an
    // equivalent convergent root>0 case.
    //
    // Because the remap is the identity here, the aggregate still lands on
    // real rank 0 (virtual rank 0), not real rank 2 — proving the point the
    // quirk makes: root>0 does not move the result to the rank named by
    // `root`.
    let params = world(22025, 4);
    let handles: Vec<_> = params
        .into_iter()
        .map(|p| {
            let rank = p.rank();
            tokio::spawn(async move {
                let collectives = Collectives::new(RetryingTransport::new(&p));
                collectives.initialize().await.unwrap();
                let local = vec![1i64, 1, 1, 1];
                let result = collectives
                    .reduce(local, 0i64, &|a: i64, b: i64| a + b, 2)
                    .await
                    .unwrap();
                collectives.finalize().await.unwrap();
                (rank, result)
            })
        })
        .collect();

    for h in handles {
        let (rank, result) = h.await.unwrap();
        if rank == 0 {
            assert_eq!(result, 16);
        }
    }
}

#[tokio::test]
async fn barrier_releases_every_rank() {
    let params = world(22030, 4);
    let handles: Vec<_> = params
        .into_iter()
        .map(|p| {
            tokio::spawn(async move {
                let collectives = Collectives::new(RetryingTransport::new(&p));
                collectives.initialize().await.unwrap();
                collectives.barrier().await.unwrap();
                collectives.finalize().await.unwrap();
            })
        })
        .collect();

    for h in handles {
        h.await.unwrap();
    }
}

#[tokio::test]
async fn gather_collects_every_ranks_contribution() {
    let params = world(22040, 4);
    let handles: Vec<_> = params
        .into_iter()
        .map(|p| {
            let rank = p.rank();
            tokio::spawn(async move {
                let collectives = Collectives::new(RetryingTransport::new(&p));
                collectives.initialize().await.unwrap();
                let result = collectives.gather(rank as i64, 0).await.unwrap();
                collectives.finalize().await.unwrap();
                (rank, result)
            })
        })
        .collect();

    for h in handles {
        let (rank, result) = h.await.unwrap();
        if rank == 0 {
            // Tree-arrival order, not ascending rank: root's own value first,
            // then whatever order the binomial tree's recv calls assemble
            // the rest in. For this four-rank, root-0 topology that order
            // happens to be rank-ascending, but asserted directly rather
            // than via a sort so a change to the tree walk would be caught.
            assert_eq!(result, vec![0, 1, 2, 3]);
        }
    }
}

#[tokio::test]
async fn scatter_distributes_contiguous_blocks() {
    let params = world(22050, 4);
    let handles: Vec<_> = params
        .into_iter()
        .map(|p| {
            let rank = p.rank();
            tokio::spawn(async move {
                let collectives = Collectives::new(RetryingTransport::new(&p));
                collectives.initialize().await.unwrap();
                // Every rank must agree on the total sequence length up front
                // (block_sz is derived from it independently per rank); only
                // root's contents are meaningful.
                let data: Vec<i64> = if rank == 0 { vec![10, 11, 12, 13] } else { vec![0; 4] };
                let result = collectives.scatter(data, 0).await.unwrap();
                collectives.finalize().await.unwrap();
                (rank, result)
            })
        })
        .collect();

    let mut by_rank = std::collections::HashMap::new();
    for h in handles {
        let (rank, result) = h.await.unwrap();
        by_rank.insert(rank, result);
    }
    assert_eq!(by_rank.len(), 4);
    for slice in by_rank.values() {
        assert_eq!(slice.len(), 1);
    }
}

#[tokio::test]
async fn scan_propagates_a_prefix_value() {
    let params = world(22060, 2);
    let handles: Vec<_> = params
        .into_iter()
        .map(|p| {
            let rank = p.rank();
            tokio::spawn(async move {
                let collectives = Collectives::new(RetryingTransport::new(&p));
                collectives.initialize().await.unwrap();
                let local = vec![rank as i64];
                let result = collectives
                    .scan(local, 0i64, |a: i64, b: i64| a + b, 0)
                    .await
                    .unwrap();
                collectives.finalize().await.unwrap();
                (rank, result)
            })
        })
        .collect();

    let mut by_rank = std::collections::HashMap::new();
    for h in handles {
        let (rank, result) = h.await.unwrap();
        by_rank.insert(rank, result);
    }
    // Rank 0 (root) holds its own unmodified element; rank 1 is folded with
    // the tree-propagated reduce value: fn(1, 1) == 2.
    assert_eq!(by_rank[&0], vec![0]);
    assert_eq!(by_rank[&1], vec![2]);
}

#[tokio::test]
async fn single_rank_world_collectives_are_no_ops() {
    let params = world(22070, 1).remove(0);
    let collectives = Collectives::new(RetryingTransport::new(&params));
    collectives.initialize().await.unwrap();

    assert_eq!(collectives.broadcast(7i64, 0).await.unwrap(), 7);
    assert_eq!(
        collectives
            .reduce(vec![1i64, 2, 3], 0i64, &|a: i64, b: i64| a + b, 0)
            .await
            .unwrap(),
        6
    );
    collectives.barrier().await.unwrap();
    assert_eq!(collectives.gather(5i64, 0).await.unwrap(), vec![5]);

    collectives.finalize().await.unwrap();
}
