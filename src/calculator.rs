//! Shared calculator handle.
//!
//! A [`Calculator`] owns one [`Engine`] behind a mutex. Programs run on a
//! background thread that takes the lock once per step, so commands and
//! observers always see the state between two steps, never inside one.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use log::{debug, warn};
use crate::config::EngineConfig;
use crate::cpu::{Engine, EngineError, Key, KeyOutcome, Observer, Silent, Snapshot, Status};
use crate::decimal::AngleMode;
use crate::eeprom::{ExchangeMode, Operation};

type SharedObserver = Arc<Mutex<Box<dyn Observer + Send>>>;

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Calculator {
    engine: Arc<Mutex<Engine>>,
    running: Arc<AtomicBool>,
    observer: SharedObserver,
    worker: Option<JoinHandle<Status>>,
}

impl Calculator {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            engine: Arc::new(Mutex::new(Engine::new(config))),
            running: Arc::new(AtomicBool::new(false)),
            observer: Arc::new(Mutex::new(Box::new(Silent))),
            worker: None,
        }
    }

    /// Replace the observer notified after every step and key.
    pub fn set_observer<O: Observer + Send + 'static>(&mut self, observer: O) {
        *lock(&self.observer) = Box::new(observer);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn power_on(&mut self) {
        self.stop();
        lock(&self.engine).power_on();
        self.notify();
    }

    pub fn power_off(&mut self) {
        self.stop();
        lock(&self.engine).power_off();
        self.notify();
    }

    pub fn set_angle_mode(&self, mode: AngleMode) {
        lock(&self.engine).set_angle_mode(mode);
    }

    /// Process one key.
    ///
    /// While a program runs only the stop key is accepted; it ends the run.
    pub fn press(&mut self, key: Key) -> KeyOutcome {
        if self.is_running() {
            if key == Key::Code(0x50) {
                self.stop();
                self.notify();
            }
            return KeyOutcome::Done;
        }
        self.reap();
        let outcome = lock(&self.engine).press(key);
        if outcome == KeyOutcome::Run {
            self.start_run();
        } else {
            self.notify();
        }
        outcome
    }

    /// Start running from the current address on a background thread.
    pub fn start_run(&mut self) {
        if self.is_running() {
            return;
        }
        self.reap();
        self.running.store(true, Ordering::Release);
        let engine = Arc::clone(&self.engine);
        let running = Arc::clone(&self.running);
        let observer = Arc::clone(&self.observer);
        debug!("starting background run");
        self.worker = Some(thread::spawn(move || {
            let mut status = Status::Continue;
            while running.load(Ordering::Acquire) {
                lock(&observer).before_step();
                let snapshot = {
                    let mut engine = lock(&engine);
                    status = engine.run_step();
                    engine.snapshot()
                };
                lock(&observer).after_step(&snapshot);
                if status != Status::Continue {
                    break;
                }
            }
            running.store(false, Ordering::Release);
            status
        }));
    }

    /// Cancel a run between steps and wait for the worker.
    pub fn stop(&mut self) -> Option<Status> {
        self.running.store(false, Ordering::Release);
        self.join()
    }

    /// Wait for the current run to end by itself.
    pub fn wait(&mut self) -> Option<Status> {
        self.join()
    }

    fn join(&mut self) -> Option<Status> {
        let worker = self.worker.take()?;
        match worker.join() {
            Ok(status) => Some(status),
            Err(_) => {
                warn!("run thread panicked");
                None
            }
        }
    }

    /// Drop a worker that has already finished.
    fn reap(&mut self) {
        if !self.is_running() {
            self.join();
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        lock(&self.engine).snapshot()
    }

    pub fn display(&self) -> String {
        lock(&self.engine).display()
    }

    fn notify(&self) {
        let snapshot = self.snapshot();
        lock(&self.observer).after_step(&snapshot);
    }

    /// Run a closure against the engine between steps.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut Engine) -> R) -> R {
        f(&mut lock(&self.engine))
    }

    pub fn load_program(&self, program: &[u8]) -> Result<(), EngineError> {
        lock(&self.engine).load_program(program)
    }

    pub fn set_eeprom_operation(&self, operation: Operation) {
        lock(&self.engine).set_eeprom_operation(operation);
    }

    pub fn set_eeprom_mode(&self, mode: ExchangeMode) {
        lock(&self.engine).set_eeprom_mode(mode);
    }

    pub fn eeprom_select(&self) -> Result<(), EngineError> {
        lock(&self.engine).eeprom_select()
    }

    pub fn eeprom_exchange(&self) -> Result<(), EngineError> {
        let result = lock(&self.engine).eeprom_exchange();
        self.notify();
        result
    }

    pub fn export_eeprom<W: Write>(&self, out: W) -> Result<(), EngineError> {
        lock(&self.engine).eeprom.export_to(out)?;
        Ok(())
    }

    pub fn import_eeprom<R: Read>(&self, input: R) -> Result<(), EngineError> {
        lock(&self.engine).eeprom.import_from(input)?;
        Ok(())
    }
}

impl Default for Calculator {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Drop for Calculator {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_background_run_to_stop() {
        let mut calc = Calculator::default();
        calc.power_on();
        calc.load_program(&[0x04, 0x0E, 0x05, 0x12, 0x50]).unwrap();
        assert_eq!(calc.press(Key::Code(0x50)), KeyOutcome::Run);
        assert_eq!(calc.wait(), Some(Status::Stop));
        assert_eq!(calc.display(), " 20.         ");
        assert!(!calc.is_running());
    }

    #[test]
    fn test_stop_key_cancels_endless_loop() {
        let mut calc = Calculator::default();
        calc.power_on();
        // BP 00
        calc.load_program(&[0x51, 0x00]).unwrap();
        let (tx, rx) = mpsc::channel();
        calc.set_observer(move |s: &Snapshot| {
            let _ = tx.send(s.pc);
        });
        calc.press(Key::Code(0x50));
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(calc.is_running());
        assert_eq!(calc.press(Key::Code(0x03)), KeyOutcome::Done);
        calc.press(Key::Code(0x50));
        assert!(!calc.is_running());
        assert!(calc.with_engine(|e| e.cycles) > 0);
    }

    #[test]
    fn test_observer_sees_key_presses() {
        let mut calc = Calculator::default();
        let (tx, rx) = mpsc::channel();
        calc.set_observer(move |s: &Snapshot| {
            let _ = tx.send(s.display.clone());
        });
        calc.power_on();
        calc.press(Key::Code(0x07));
        let seen: Vec<String> = rx.try_iter().collect();
        assert_eq!(seen.last().map(String::as_str), Some(" 7.          "));
    }

    #[test]
    fn test_power_off_stops_run() {
        let mut calc = Calculator::default();
        calc.power_on();
        calc.load_program(&[0x51, 0x00]).unwrap();
        calc.start_run();
        calc.power_off();
        assert!(!calc.is_running());
        assert_eq!(calc.display(), "             ");
    }
}
