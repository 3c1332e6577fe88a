// Lock-free SPSC channel feeding the audio callback

use crate::messaging::command::AudioCommand;
use ringbuf::{HeapRb, traits::Split};

pub type AudioCommandProducer = ringbuf::HeapProd<AudioCommand>;
pub type AudioCommandConsumer = ringbuf::HeapCons<AudioCommand>;

pub fn create_audio_channel(capacity: usize) -> (AudioCommandProducer, AudioCommandConsumer) {
    let rb = HeapRb::<AudioCommand>::new(capacity.max(1));
    rb.split()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::loader::Sample;
    use ringbuf::traits::{Consumer, Producer};
    use std::sync::Arc;

    fn play(gain: f32) -> AudioCommand {
        let sample = Arc::new(Sample {
            name: "click".to_string(),
            data: vec![1.0],
            sample_rate: 48000,
            source_channels: 1,
        });
        AudioCommand::Play { sample, gain }
    }

    fn gain_of(command: Option<AudioCommand>) -> Option<f32> {
        command.map(|AudioCommand::Play { gain, .. }| gain)
    }

    #[test]
    fn test_channel_is_bounded_fifo() {
        let (mut tx, mut rx) = create_audio_channel(2);

        assert!(tx.try_push(play(0.1)).is_ok());
        assert!(tx.try_push(play(0.2)).is_ok());
        assert!(tx.try_push(play(0.3)).is_err());

        assert_eq!(gain_of(rx.try_pop()), Some(0.1));
        assert!(tx.try_push(play(0.4)).is_ok());
        assert_eq!(gain_of(rx.try_pop()), Some(0.2));
        assert_eq!(gain_of(rx.try_pop()), Some(0.4));
        assert!(rx.try_pop().is_none());
    }
}
