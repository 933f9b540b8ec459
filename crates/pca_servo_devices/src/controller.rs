use embedded_hal::i2c::I2c;
use pca_servo_core::{Calibration, ServoError};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::driver::ServoDriver;

const COMMAND_QUEUE_SIZE: usize = 32;

type Reply<T> = oneshot::Sender<Result<T, ServoError>>;

enum Command {
    SetModuleFrequency {
        freq_hz: f64,
        reply: Reply<()>,
    },
    Configure {
        channel: u8,
        low: f64,
        high: f64,
        reply: Reply<()>,
    },
    GetConfiguration {
        channel: u8,
        reply: Reply<Calibration>,
    },
    Move {
        channel: u8,
        position: f64,
        reply: Reply<()>,
    },
    MoveDegrees {
        channel: u8,
        degrees: f64,
        reply: Reply<()>,
    },
    SetDutyCycle {
        channel: u8,
        duty_cycle: f64,
        reply: Reply<()>,
    },
    Read {
        channel: u8,
        reply: Reply<f64>,
    },
}

impl Command {
    //returns false when the caller stopped waiting for the reply
    fn run<I2C: I2c>(self, driver: &mut ServoDriver<I2C>) -> bool {
        match self {
            Command::SetModuleFrequency { freq_hz, reply } => {
                reply.send(driver.set_module_frequency(freq_hz)).is_ok()
            }
            Command::Configure {
                channel,
                low,
                high,
                reply,
            } => {
                reply.send(driver.configure(channel, low, high)).is_ok()
            }
            Command::GetConfiguration { channel, reply } => {
                reply.send(driver.get_configuration(channel)).is_ok()
            }
            Command::Move {
                channel,
                position,
                reply,
            } => {
                reply.send(driver.move_to(channel, position)).is_ok()
            }
            Command::MoveDegrees {
                channel,
                degrees,
                reply,
            } => {
                reply.send(driver.move_to_degrees(channel, degrees)).is_ok()
            }
            Command::SetDutyCycle {
                channel,
                duty_cycle,
                reply,
            } => {
                reply.send(driver.set_duty_cycle(channel, duty_cycle)).is_ok()
            }
            Command::Read { channel, reply } => reply.send(driver.read(channel)).is_ok(),
        }
    }
}

fn spawn_controller_task<I2C>(
    mut driver: ServoDriver<I2C>,
    mut rx: mpsc::Receiver<Command>,
    cancel_token: CancellationToken,
) -> JoinHandle<()>
where
    I2C: I2c + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => break,
                command = rx.recv() => match command {
                    //each command runs to completion before the next one is taken off the queue
                    Some(command) => {
                        if !command.run(&mut driver) {
                            debug!("servo command finished after its caller went away");
                        }
                    }
                    None => break,
                },
            }
        }
        debug!(
            "servo controller for PCA9685 at 0x{:02X} shutting down.",
            driver.address()
        );
    })
}

///Cloneable async handle to a `ServoDriver` owned by a tokio task.
///
/// Requests from every clone go through one queue and are run one at a time, so the chained
/// register writes of two moves never interleave on the bus. Dropping a request future stops
/// waiting for the result but does not cancel a register chain that has already started.
#[derive(Clone)]
pub struct ServoController {
    tx: mpsc::Sender<Command>,
}

impl ServoController {
    ///Hands `driver` to a new task. The task ends when every handle is dropped or `cancel_token` is
    ///cancelled.
    pub fn spawn<I2C>(
        driver: ServoDriver<I2C>,
        cancel_token: CancellationToken,
    ) -> (Self, JoinHandle<()>)
    where
        I2C: I2c + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_SIZE);
        let join_handle = spawn_controller_task(driver, rx, cancel_token);
        (ServoController { tx }, join_handle)
    }

    ///Spawns the controller and programs the pwm frequency. Resolves once the chip is ready, or
    ///with the error that kept it from becoming ready.
    pub async fn connect<I2C>(
        driver: ServoDriver<I2C>,
        freq_hz: f64,
        cancel_token: CancellationToken,
    ) -> Result<(Self, JoinHandle<()>), ServoError>
    where
        I2C: I2c + Send + 'static,
    {
        let (controller, join_handle) = ServoController::spawn(driver, cancel_token);
        match controller.set_module_frequency(freq_hz).await {
            Ok(()) => Ok((controller, join_handle)),
            Err(err) => {
                error!("PCA9685 did not become ready: {}", err);
                Err(err)
            }
        }
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, ServoError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| ServoError::ControllerClosed)?;
        rx.await.map_err(|_| ServoError::ControllerClosed)?
    }

    pub async fn set_module_frequency(&self, freq_hz: f64) -> Result<(), ServoError> {
        self.request(|reply| Command::SetModuleFrequency { freq_hz, reply }).await
    }

    pub async fn configure(&self, channel: u8, low: f64, high: f64) -> Result<(), ServoError> {
        self.request(|reply| Command::Configure {
            channel,
            low,
            high,
            reply,
        })
        .await
    }

    pub async fn get_configuration(&self, channel: u8) -> Result<Calibration, ServoError> {
        self.request(|reply| Command::GetConfiguration { channel, reply }).await
    }

    pub async fn move_to(&self, channel: u8, position: f64) -> Result<(), ServoError> {
        self.request(|reply| Command::Move {
            channel,
            position,
            reply,
        })
        .await
    }

    pub async fn move_to_degrees(&self, channel: u8, degrees: f64) -> Result<(), ServoError> {
        self.request(|reply| Command::MoveDegrees {
            channel,
            degrees,
            reply,
        })
        .await
    }

    pub async fn set_duty_cycle(&self, channel: u8, duty_cycle: f64) -> Result<(), ServoError> {
        self.request(|reply| Command::SetDutyCycle {
            channel,
            duty_cycle,
            reply,
        })
        .await
    }

    ///Approximate target position, see `ServoDriver::read`. Lossy, not for use in feedback loops.
    pub async fn read(&self, channel: u8) -> Result<f64, ServoError> {
        self.request(|reply| Command::Read { channel, reply }).await
    }
}
