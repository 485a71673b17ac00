use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use tally_engine::resolve_vote;
use tally_shared::types::{Poll, PollOption, PollState};
use uuid::Uuid;

/// Creates a poll with `count` options and a spread of votes.
fn make_poll(count: usize) -> Poll {
    let options: Vec<PollOption> = (0..count)
        .map(|i| PollOption {
            votes: (i * 7 % 13) as i64,
            ..PollOption::new(format!("option {i}"))
        })
        .collect();
    Poll {
        question: "Which one?".to_string(),
        total_votes: options.iter().map(|o| o.votes).sum(),
        options,
        expires_at: None,
        allow_multiple: true,
    }
}

/// Benchmark the vote transition table
fn vote_resolution(c: &mut Criterion) {
    let inputs = [
        (None, true),
        (None, false),
        (Some(true), true),
        (Some(false), false),
        (Some(true), false),
        (Some(false), true),
    ];

    c.bench_function("resolve_vote", |b| {
        b.iter(|| {
            for (previous, value) in inputs {
                black_box(resolve_vote(black_box(previous), black_box(value)));
            }
        })
    });
}

/// Benchmark building the poll view returned by every poll operation
fn poll_state_building(c: &mut Criterion) {
    let mut group = c.benchmark_group("poll_state");

    for size in [4, 32, 256] {
        group.bench_function(format!("options_{size}"), |b| {
            b.iter_batched(
                || make_poll(size),
                |poll| PollState::new(Uuid::new_v4(), black_box(&poll), &[]),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, vote_resolution, poll_state_building);
criterion_main!(benches);
