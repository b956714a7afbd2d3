//! JACK client setup and the real-time process callback. Generalises the
//! teacher's `audio::handler`/`audio::processor` split: one `AsyncClient`
//! owns every MIDI and audio port across every engine, and a single
//! `ProcessHandler` drains/fills all of them each cycle. Art-Net is not a
//! JACK port; its receive and transmit threads are plain OS threads spawned
//! alongside the client.

use std::net::{Ipv4Addr, UdpSocket};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use jack::{
    AsyncClient, AudioIn, AudioOut, Client, ClientOptions, Control, MidiIn, MidiOut,
    NotificationHandler, Port, ProcessHandler, ProcessScope, RawMidi,
};

use crate::artnet::{ArtnetBroadcast, ArtnetInput, ArtnetOutput};
use crate::config::RootSettings;
use crate::logger::{log, LogContext, LogKind};
use crate::ltc::{LtcInput, LtcOutput};
use crate::mtc::{MtcInput, MtcMessage, MtcOutput};
use crate::passthru::AudioPassthru;
use crate::supervisor::EngineSupervisor;
use crate::timecode::now_ms;

#[derive(Debug)]
pub enum AudioIoError {
    Jack(jack::Error),
    Io(std::io::Error),
}

impl std::fmt::Display for AudioIoError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AudioIoError::Jack(e) => write!(f, "JACK error: {e}"),
            AudioIoError::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for AudioIoError {}

impl From<jack::Error> for AudioIoError {
    fn from(err: jack::Error) -> Self {
        AudioIoError::Jack(err)
    }
}

impl From<std::io::Error> for AudioIoError {
    fn from(err: std::io::Error) -> Self {
        AudioIoError::Io(err)
    }
}

/// A peak level measured on the audio thread, forwarded to the orchestration
/// thread so it can feed `TimecodeEngine`'s VU meters without the engine
/// needing to be touched from two threads at once.
pub enum PeakReport {
    Input(usize, f32),
    Passthru(usize, f32),
}

struct Notifications;

impl NotificationHandler for Notifications {
    fn xrun(&mut self, _client: &Client) -> Control {
        log("xrun".to_string(), LogContext::Audio, LogKind::Debug);
        Control::Continue
    }
}

struct MtcPorts {
    input: Option<(Arc<MtcInput>, Port<MidiIn>)>,
    output: Option<(Arc<MtcOutput>, Port<MidiOut>)>,
}

struct LtcInputPorts {
    input: LtcInput,
    ltc_channel: Port<AudioIn>,
    passthru_channel: Option<Port<AudioIn>>,
    passthru_gain: f32,
}

struct PassthruPorts {
    passthru: Arc<AudioPassthru>,
    primary: Port<AudioOut>,
    secondary: Option<Port<AudioOut>>,
    channel: i32,
    gain: f32,
}

struct EnginePorts {
    engine_index: usize,
    mtc: MtcPorts,
    ltc_in: Option<LtcInputPorts>,
    ltc_out: Option<(Arc<LtcOutput>, Port<AudioOut>)>,
    passthru: Option<PassthruPorts>,
}

/// The real-time callback. Every field here is either audio-thread-exclusive
/// state (the `LtcInput` decoders, the JACK ports) or an `Arc` handle shared
/// with the orchestration thread via purely `&self` methods.
struct AudioProcess {
    engines: Vec<EnginePorts>,
    peak_tx: Sender<PeakReport>,
}

impl ProcessHandler for AudioProcess {
    fn process(&mut self, _client: &Client, ps: &ProcessScope) -> Control {
        let now = now_ms() as f64;

        for engine in &mut self.engines {
            if let Some((input, port)) = &engine.mtc.input {
                for event in port.iter(ps) {
                    if event.bytes.len() == 2 && event.bytes[0] == 0xF1 {
                        input.feed_quarter_frame(event.bytes[1]);
                    } else if event.bytes.first() == Some(&0xF0) {
                        input.feed_sysex(event.bytes);
                    }
                }
            }

            if let Some((output, port)) = &mut engine.mtc.output {
                let mut writer = port.writer(ps);
                for msg in output.tick(now) {
                    let bytes: Vec<u8> = match msg {
                        MtcMessage::QuarterFrame(b) => vec![0xF1, b],
                        MtcMessage::FullFrame(full) => full.to_vec(),
                    };
                    let _ = writer.write(&RawMidi { time: 0, bytes: &bytes });
                }
            }

            if let Some(ltc_in) = &mut engine.ltc_in {
                let ltc_samples = ltc_in.ltc_channel.as_slice(ps);
                let passthru_block = ltc_in
                    .passthru_channel
                    .as_ref()
                    .map(|p| (p.as_slice(ps), ltc_in.passthru_gain));
                let peak = ltc_in.input.process_block(ltc_samples, passthru_block);
                let _ = self.peak_tx.try_send(PeakReport::Input(engine.engine_index, peak));
            }

            if let Some((output, port)) = &mut engine.ltc_out {
                output.render(port.as_mut_slice(ps));
            }

            if let Some(passthru) = &mut engine.passthru {
                let mut peak = 0.0f32;
                let secondary = passthru.secondary.as_mut().map(|p| p.as_mut_slice(ps));
                let primary = passthru.primary.as_mut_slice(ps);
                passthru.passthru.render(passthru.channel, passthru.gain, primary, secondary);
                for &s in primary.iter() {
                    peak = peak.max(s.abs());
                }
                let _ = self.peak_tx.try_send(PeakReport::Passthru(engine.engine_index, peak));
            }
        }

        Control::Continue
    }
}

struct ArtnetThreads {
    shutdown: Arc<AtomicBool>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl ArtnetThreads {
    fn shutdown(self) {
        self.shutdown.store(true, Ordering::Release);
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

/// Owns the JACK client and the background Art-Net threads. Dropping this
/// leaves the JACK client running; call [`Self::shutdown`] for a clean stop.
pub struct AudioIo {
    client: AsyncClient<Notifications, AudioProcess>,
    artnet: ArtnetThreads,
    pub peak_rx: Receiver<PeakReport>,
}

fn engine_port_name(engine_name: &str, suffix: &str) -> String {
    format!("{}_{suffix}", engine_name.replace(' ', "_"))
}

impl AudioIo {
    /// Builds JACK (and Art-Net) ports for every engine currently held by
    /// `supervisor`, stashing the `Arc`-shared handles back onto each engine
    /// so the orchestration thread's `tick()` can drive them. Spawns one
    /// Art-Net receive thread per enabled `ArtnetInput` and one transmit
    /// thread per enabled `ArtnetOutput`, per the one-thread-per-device model.
    pub fn start(supervisor: &mut EngineSupervisor, settings: &RootSettings) -> Result<Self, AudioIoError> {
        let (client, _status) = Client::new("chase-core", ClientOptions::NO_START_SERVER)?;
        let sample_rate = client.sample_rate() as f64;

        let (peak_tx, peak_rx) = unbounded();
        let mut engine_ports = Vec::with_capacity(settings.engines.len());
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut artnet_handles = Vec::new();

        for (index, engine_settings) in settings.engines.iter().enumerate() {
            let Some(engine) = supervisor.engine_mut(index) else { continue };
            let base = engine_settings.name.clone();

            let mut mtc = MtcPorts { input: None, output: None };
            if engine_settings.mtc_input_device.is_some() {
                let port = client.register_port(&engine_port_name(&base, "mtc_in"), MidiIn::default())?;
                let input = Arc::new(MtcInput::new());
                engine.mtc_input = Some(input.clone());
                mtc.input = Some((input, port));
            }
            if engine_settings.mtc_output.enabled {
                let port = client.register_port(&engine_port_name(&base, "mtc_out"), MidiOut::default())?;
                let output = Arc::new(MtcOutput::new());
                engine.mtc_output = Some(output.clone());
                mtc.output = Some((output, port));
            }

            let mut ltc_in = None;
            if engine_settings.ltc_input_device.is_some() {
                let ltc_channel = client.register_port(&engine_port_name(&base, "ltc_in"), AudioIn::default())?;
                let passthru_channel = if engine_settings.passthru_channel >= 0 {
                    Some(client.register_port(&engine_port_name(&base, "passthru_capture"), AudioIn::default())?)
                } else {
                    None
                };
                let input = LtcInput::new(sample_rate);
                engine.ltc_published = Some(input.published());
                ltc_in = Some(LtcInputPorts {
                    input,
                    ltc_channel,
                    passthru_channel,
                    passthru_gain: engine_settings.gain_percent as f32 / 100.0,
                });
            }

            let mut ltc_out = None;
            if engine_settings.ltc_output.enabled {
                let port = client.register_port(&engine_port_name(&base, "ltc_out"), AudioOut::default())?;
                let output = Arc::new(LtcOutput::new(sample_rate, engine_settings.output_frame_rate));
                engine.ltc_output = Some(output.clone());
                ltc_out = Some((output, port));
            }

            let mut passthru = None;
            if index == 0 {
                if let Some(passthru_handle) = engine.passthru.clone() {
                    if engine_settings.passthru_output_device.is_some() {
                        if let Some(published) = engine.ltc_published.clone() {
                            passthru_handle.set_source(published);
                        }
                        let primary = client.register_port(&engine_port_name(&base, "passthru_out"), AudioOut::default())?;
                        let secondary = if engine_settings.passthru_channel == -1 {
                            Some(client.register_port(&engine_port_name(&base, "passthru_out_2"), AudioOut::default())?)
                        } else {
                            None
                        };
                        passthru = Some(PassthruPorts {
                            passthru: passthru_handle,
                            primary,
                            secondary,
                            channel: engine_settings.passthru_channel,
                            gain: engine_settings.gain_percent as f32 / 100.0,
                        });
                    }
                }
            }

            if let Some(interface) = &engine_settings.artnet_input_interface {
                let input = Arc::new(ArtnetInput::new());
                engine.artnet_input = Some(input.clone());
                let iface_ip = Ipv4Addr::from_str(interface).ok();
                let socket = input.bind(iface_ip).map_err(AudioIoError::Io)?;
                let shutdown = shutdown.clone();
                artnet_handles.push(thread::spawn(move || input.run(&socket, &shutdown)));
            }
            if engine_settings.artnet_output.enabled {
                let output = Arc::new(ArtnetOutput::new());
                engine.artnet_output = Some(output.clone());
                let socket = UdpSocket::bind("0.0.0.0:0").map_err(AudioIoError::Io)?;
                socket.set_broadcast(true).ok();
                let shutdown = shutdown.clone();
                artnet_handles.push(thread::spawn(move || {
                    while !shutdown.load(Ordering::Acquire) {
                        if let Some(packet) = output.tick(now_ms() as f64) {
                            let _ = ArtnetOutput::send(&socket, ArtnetBroadcast::All, &packet);
                        }
                        thread::sleep(Duration::from_millis(1));
                    }
                }));
            }

            engine_ports.push(EnginePorts { engine_index: index, mtc, ltc_in, ltc_out, passthru });
        }

        let process = AudioProcess { engines: engine_ports, peak_tx };
        let client = client.activate_async(Notifications, process)?;

        Ok(Self { client, artnet: ArtnetThreads { shutdown, handles: artnet_handles }, peak_rx })
    }

    /// Deactivates the JACK client and joins every background Art-Net thread.
    pub fn shutdown(self) {
        let _ = self.client.deactivate();
        self.artnet.shutdown();
    }
}
