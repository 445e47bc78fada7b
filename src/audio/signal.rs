use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Señal de avance de un solo slot, disparada por nivel.
///
/// `set` sobre una señal ya activa no hace nada y `clear` es explícito al
/// inicio de cada ciclo. Hay un único esperador: el loop del reproductor.
#[derive(Debug, Default)]
pub struct AdvanceSignal {
    flag: AtomicBool,
    notify: Notify,
}

impl AdvanceSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        if !self.flag.swap(true, Ordering::AcqRel) {
            self.notify.notify_waiters();
        }
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Espera hasta que la señal esté activa. Retorna de inmediato si ya lo está.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Registrarse antes de revisar el flag para no perder un set concurrente
            notified.as_mut().enable();

            if self.is_set() {
                return;
            }

            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, time::Duration};

    #[tokio::test]
    async fn test_wait_returns_when_already_set() {
        let signal = AdvanceSignal::new();
        signal.set();
        signal.set();

        tokio::time::timeout(Duration::from_millis(100), signal.wait())
            .await
            .expect("la señal ya estaba activa");
        assert!(signal.is_set());
    }

    #[tokio::test]
    async fn test_set_wakes_waiter() {
        let signal = Arc::new(AdvanceSignal::new());
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        signal.set();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("el waiter debió despertar")
            .unwrap();
    }

    #[tokio::test]
    async fn test_clear_blocks_again() {
        let signal = AdvanceSignal::new();
        signal.set();
        signal.clear();

        let result = tokio::time::timeout(Duration::from_millis(50), signal.wait()).await;
        assert!(result.is_err());
    }
}
