use criterion::{black_box, criterion_group, criterion_main, Criterion};
use klingt_graph::nodes::{Gain, Mixer, Sine};
use klingt_graph::{Connection, EngineConfig, GraphEngine, GraphProcessor, MidiBuffer};

/// `tracks` sines through gains into a mixer, mixed to a stereo output.
fn mixer_graph(tracks: usize) -> (GraphEngine, GraphProcessor) {
    let (mut engine, mut processor) = GraphEngine::new(EngineConfig::new(48_000).with_max_block_size(512));
    let mixer = engine.add_node(Mixer::new(tracks)).id();
    let out = engine.add_audio_output(2);
    for track in 0..tracks {
        let sine = engine.add_node(Sine::new(110.0 * (track + 1) as f32)).id();
        let gain = engine.add_node(Gain::new(0.5)).id();
        let arcs = [
            Connection::new(sine, 1, gain, 0),
            Connection::new(gain, 3, mixer, track * 2),
            Connection::new(gain, 4, mixer, track * 2 + 1),
        ];
        engine.rewire(&[], &arcs).unwrap();
    }
    let master = tracks * 2;
    engine.connect(Connection::new(mixer, master, out, 0)).unwrap();
    engine.connect(Connection::new(mixer, master + 1, out, 1)).unwrap();
    settle(&mut engine, &mut processor);
    (engine, processor)
}

/// Run blocks until every held back command has reached the processor.
fn settle(engine: &mut GraphEngine, processor: &mut GraphProcessor) {
    let mut left = vec![0.0f32; 512];
    let mut midi = MidiBuffer::with_capacity(64);
    loop {
        processor.process(&mut [left.as_mut_slice()], &mut midi);
        engine.maintain();
        if engine.is_settled() {
            break;
        }
    }
}

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("GraphProcessor::process() 16 tracks x 512", |b| {
        let (_engine, mut processor) = mixer_graph(16);
        let mut left = vec![0.0f32; 512];
        let mut right = vec![0.0f32; 512];
        let mut midi = MidiBuffer::with_capacity(64);

        b.iter(|| {
            processor.process(&mut [left.as_mut_slice(), right.as_mut_slice()], &mut midi);
            black_box(left[0]);
        })
    });

    c.bench_function("GraphEngine rebuild 64 tracks", |b| {
        let (mut engine, mut processor) = mixer_graph(64);
        let mut left = vec![0.0f32; 64];
        let mut midi = MidiBuffer::with_capacity(64);
        let sine = engine.add_node(Sine::new(440.0)).id();
        let gain = engine.add_node(Gain::new(1.0)).id();
        let arc = Connection::new(sine, 1, gain, 0);

        b.iter(|| {
            engine.connect(arc).unwrap();
            engine.disconnect(arc);
            // drain the command queue so the engine never holds commands back
            processor.process(&mut [left.as_mut_slice()], &mut midi);
            engine.maintain();
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
