use lockstep_benches::dff::{self, Dff, DffDriver, DffMonitor};
use lockstep_benches::fifo::{self, FifoFault, FifoTxn};
use lockstep_benches::mux::{self, MuxFault};
use lockstep_benches::{run_bench, BenchKind};
use lockstep_core::{Environment, HarnessConfig, Phase, ScriptedStimulus, StopReason, Tag};

const TAGS: [Tag; 5] = [Tag::Gen, Tag::Drv, Tag::Mon, Tag::Ref, Tag::Sco];

fn fifo_script() -> Vec<FifoTxn> {
    vec![
        FifoTxn::write(4),
        FifoTxn::write(7),
        FifoTxn::write(2),
        FifoTxn::read(),
        FifoTxn::read(),
        FifoTxn::read(),
    ]
}

/// `dout` values of the read observations, in order.
fn read_outputs(env: &fifo::FifoEnv) -> Vec<u8> {
    env.diagnostics()
        .records_for(Tag::Mon)
        .iter()
        .filter(|record| record.line.contains(" op:read"))
        .filter_map(|record| {
            record
                .line
                .split_whitespace()
                .find_map(|field| field.strip_prefix("dout:"))
                .and_then(|value| value.parse().ok())
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_mux_random_run_passes() {
    let mut env = mux::environment(HarnessConfig::with_iterations(20), None).unwrap();
    let report = env.run().await.unwrap();

    assert!(report.passed(), "{report}");
    assert_eq!(report.counts.matched, 20);
    for tag in TAGS {
        assert_eq!(env.diagnostics().count(tag), 20, "count for {tag}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_mux_stuck_select_is_caught() {
    let mut env =
        mux::environment(HarnessConfig::with_iterations(20), Some(MuxFault::StuckSelect(0)))
            .unwrap();
    let report = env.run().await.unwrap();

    assert!(report.errors > 0);
    assert_eq!(report.counts.compared, 20);
    assert_eq!(report.stop_reason, StopReason::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_dff_five_items_pass_through() {
    let mut env = dff::environment(HarnessConfig::with_iterations(5), None).unwrap();
    let report = env.run().await.unwrap();

    assert_eq!(report.errors, 0);
    for tag in TAGS {
        assert_eq!(env.diagnostics().count(tag), 5, "count for {tag}");
    }
    assert!(report.max_in_flight <= 1);
}

#[tokio::test(start_paused = true)]
async fn test_dff_inverted_output_fails_every_item() {
    let mut env = dff::environment(
        HarnessConfig::with_iterations(8),
        Some(dff::DffFault::Inverted),
    )
    .unwrap();
    let report = env.run().await.unwrap();

    assert_eq!(report.errors, 8);
    assert!(!report.passed());
}

#[tokio::test(start_paused = true)]
async fn test_dff_output_is_reset_value_after_reset() {
    let preloaded = Dff {
        din: true,
        dout: true,
        ..Dff::default()
    };
    let mut env = Environment::new(
        "dff",
        HarnessConfig::with_iterations(1),
        preloaded,
        DffDriver,
        DffMonitor,
        dff::checker(),
    )
    .unwrap();

    env.pre_test().await.unwrap();
    assert_eq!(env.phase(), Phase::Reset);
    assert!(!env.device().peek(|dut| dut.dout));
    assert!(!env.device().peek(|dut| dut.rst));
    assert_eq!(env.diagnostics().count(Tag::Rst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fifo_writes_then_reads_in_order() {
    let script = fifo_script();
    let mut config = HarnessConfig::with_iterations(script.len() as u64);
    config.seed = 1;
    let mut env = fifo::environment(config, None).unwrap();
    env.set_stimulus(ScriptedStimulus::new(script)).unwrap();

    let report = env.run().await.unwrap();
    assert_eq!(read_outputs(&env), vec![4, 7, 2]);
    assert_eq!(report.errors, 0);
    assert_eq!(report.counts.matched, 6);
    assert!(env.device().peek(|dut| dut.is_empty()));
}

#[tokio::test(start_paused = true)]
async fn test_fifo_corrupted_reads_are_counted() {
    let script = fifo_script();
    let mut env = fifo::environment(
        HarnessConfig::with_iterations(script.len() as u64),
        Some(FifoFault::CorruptRead(0x01)),
    )
    .unwrap();
    env.set_stimulus(ScriptedStimulus::new(script)).unwrap();

    let report = env.run().await.unwrap();
    assert_eq!(read_outputs(&env), vec![5, 6, 3]);
    assert_eq!(report.errors, 3);
    assert_eq!(report.counts.mismatched, 3);
}

#[tokio::test(start_paused = true)]
async fn test_fifo_blocks_writes_when_full_and_reads_when_empty() {
    let extra = fifo::DEPTH + 1;
    let script: Vec<FifoTxn> = (0..extra as u8)
        .map(FifoTxn::write)
        .chain(std::iter::repeat_with(FifoTxn::read).take(extra))
        .collect();
    let mut env = fifo::environment(
        HarnessConfig::with_iterations(script.len() as u64),
        None,
    )
    .unwrap();
    env.set_stimulus(ScriptedStimulus::new(script)).unwrap();

    let report = env.run().await.unwrap();
    assert_eq!(report.errors, 0, "{report}");
    assert_eq!(report.counts.matched, 2 * fifo::DEPTH as u64);
    assert_eq!(report.counts.skipped, 2);

    let skipped: Vec<String> = env
        .diagnostics()
        .records_for(Tag::Sco)
        .into_iter()
        .filter(|record| record.line.contains("result:skipped"))
        .map(|record| record.line)
        .collect();
    assert_eq!(skipped.len(), 2);
    assert!(skipped[0].contains("write blocked by full"));
    assert!(skipped[1].contains("read blocked by empty"));

    // The blocked 17th write never reached the queue.
    let reads = read_outputs(&env);
    let expected: Vec<u8> = (0..fifo::DEPTH as u8).collect();
    assert_eq!(&reads[..fifo::DEPTH], expected.as_slice());
    assert!(env.device().peek(|dut| dut.is_empty()));
}

#[tokio::test(start_paused = true)]
async fn test_fifo_random_run_passes() {
    let mut env = fifo::environment(HarnessConfig::with_iterations(40), None).unwrap();
    let report = env.run().await.unwrap();

    assert_eq!(report.errors, 0, "{report}");
    assert_eq!(report.counts.compared, 40);
    assert_eq!(report.counts.matched + report.counts.skipped, 40);
}

#[tokio::test(start_paused = true)]
async fn test_every_bench_passes_by_name() {
    for kind in BenchKind::ALL {
        let report = run_bench(kind, HarnessConfig::with_iterations(10), false)
            .await
            .unwrap();
        assert_eq!(report.bench, kind.as_str());
        assert!(report.passed(), "{report}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_same_seed_same_diagnostics() {
    let mut first = mux::environment(HarnessConfig::with_iterations(6), None).unwrap();
    let mut second = mux::environment(HarnessConfig::with_iterations(6), None).unwrap();
    first.run().await.unwrap();
    second.run().await.unwrap();

    assert_eq!(
        first.diagnostics().records(),
        second.diagnostics().records()
    );
}
