use beatloop::audio::AudioOutput;
use beatloop::midi::list_output_ports;
use beatloop::sampler::SampleBank;
use beatloop::sink::SinkStatus;
use beatloop::{
    CancellationToken, MidirSink, SessionBuilder, SessionConfig, SessionError, SystemTimeSource,
    TextFrameSink, load_recording, prepare_patterns,
};
use std::io::{self, BufRead};
use std::path::Path;
use std::process::ExitCode;
use std::thread;

fn usage() {
    eprintln!("Usage: beatloop <session.ron>");
    eprintln!("       beatloop --list-ports");
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [flag] if flag == "--list-ports" => {
            let ports = list_output_ports();
            if ports.is_empty() {
                println!("No MIDI output ports");
            }
            for port in ports {
                let marker = if port.is_default { " (default)" } else { "" };
                println!("{}: {}{}", port.index, port.name, marker);
            }
            ExitCode::SUCCESS
        }
        [path] => match run(Path::new(path)) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                log::error!("{}", e);
                ExitCode::FAILURE
            }
        },
        _ => {
            usage();
            ExitCode::from(2)
        }
    }
}

fn run(path: &Path) -> Result<(), SessionError> {
    let config = SessionConfig::load(path)?;

    let recording = match &config.midi_file {
        Some(file) => Some(load_recording(file)?),
        None => None,
    };
    let patterns = prepare_patterns(&config, recording.as_ref())?;

    let midi = MidirSink::connect(config.midi_port.as_deref())
        .map(|sink| sink.with_channel(config.midi_channel));

    // The cpal stream must stay alive (and on this thread) while playing
    let mut audio_output = None;
    let mut builder = SessionBuilder::new(config.clone(), patterns)
        .with_midi(midi)
        .with_frame_sink(TextFrameSink::new(io::stdout()));

    if let Some(bank_path) = &config.sample_bank {
        let bank = SampleBank::load_from_file(bank_path)?;
        let base_dir = bank_path.parent().unwrap_or_else(|| Path::new(""));
        let samples = bank.load_samples(base_dir);

        let audio = AudioOutput::start(samples).map(|(output, sink)| {
            audio_output = Some(output);
            sink
        });
        builder = builder.with_audio(audio);
    }

    let session = builder.build(SystemTimeSource::new())?;

    let cancel = CancellationToken::new();
    let stopper = cancel.clone();
    thread::spawn(move || {
        let mut line = String::new();
        // EOF also stops playback
        let _ = io::stdin().lock().read_line(&mut line);
        stopper.cancel();
    });

    println!("Playing. Press Enter to stop.");
    let report = session.run(&cancel);

    if let Some(midi) = report.midi {
        log::info!("MIDI: {} messages written, {} failed", midi.written, midi.failed);
    }
    if let Some(audio) = report.audio {
        log::info!("Audio: {} samples played, {} failed", audio.written, audio.failed);
    }
    if let Some(output) = &audio_output {
        if output.status() == SinkStatus::Faulted {
            log::warn!("Audio stream reported an error during playback");
        }
    }
    log::info!(
        "Timing: max lateness {:?}, final lateness {:?}",
        report.clock.max_lateness,
        report.clock.final_lateness
    );
    Ok(())
}
