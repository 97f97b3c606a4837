use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use valet_lot::Lot;
use valet_proto::{location_code, AppNotice, AppRequest, Assignment, Direction, Role, RobotCommand, RobotEvent};

use crate::registry::{ClientRegistry, OUTBOX_DEPTH};

/// Shared dispatcher state. When both locks are needed the lot is taken
/// first.
pub struct Dispatcher {
    lot: Mutex<Lot>,
    registry: Mutex<ClientRegistry>,
    robot_handle: u32,
}

impl Dispatcher {
    pub fn new(lot: Lot, robot_handle: u32) -> Self {
        Self { lot: Mutex::new(lot), registry: Mutex::new(ClientRegistry::default()), robot_handle }
    }

    pub async fn occupancy(&self) -> (usize, usize) {
        self.lot.lock().await.occupancy()
    }

    pub async fn clients(&self, role: Role) -> Vec<u32> {
        self.registry.lock().await.ids(role)
    }

    /// Handles one app request, returning the reply for that app if any.
    pub async fn handle_app(&self, req: AppRequest) -> Option<AppNotice> {
        match req {
            AppRequest::In { vehicle } => Some(self.park(vehicle).await),
            AppRequest::Out { vehicle } => self.retrieve(vehicle).await,
            AppRequest::Status => {
                let (occupied, total) = self.occupancy().await;
                Some(AppNotice::Status { occupied, total })
            }
        }
    }

    // Find, assign and hand off to the robot in one lot lock scope.
    async fn park(&self, vehicle: String) -> AppNotice {
        let mut lot = self.lot.lock().await;
        if let Some(slot) = lot.locate(&vehicle) {
            return AppNotice::AlreadyParked { code: slot.location_code(), vehicle };
        }
        let Some(free) = lot.find_first_empty() else {
            info!("dispatch: no space for {}", vehicle);
            return AppNotice::NoSpace { vehicle };
        };
        let slot = match lot.assign(free.sector, free.side.as_str(), free.subzone, &vehicle) {
            Ok(s) => s,
            Err(e) => {
                warn!("dispatch: assign {} failed: {}", vehicle, e);
                return AppNotice::NoSpace { vehicle };
            }
        };

        let cmd = RobotCommand::Park(Assignment { slot, direction: Direction::Forward, vehicle: vehicle.clone() });
        if !self.registry.lock().await.send_to(Role::Robot, self.robot_handle, &cmd.to_string()) {
            warn!("dispatch: robot #{} not connected, releasing {}", self.robot_handle, slot);
            if let Err(e) = lot.clear(slot.sector, slot.side.as_str(), slot.subzone) {
                warn!("dispatch: rollback of {} failed: {}", slot, e);
            }
            return AppNotice::NoRobot { vehicle };
        }
        info!("dispatch: {} -> robot #{}", cmd, self.robot_handle);
        AppNotice::Assigned { code: slot.location_code(), vehicle }
    }

    // The bay stays booked until the robot reports OUT_DONE.
    async fn retrieve(&self, vehicle: String) -> Option<AppNotice> {
        let lot = self.lot.lock().await;
        let Some(slot) = lot.locate(&vehicle) else {
            info!("dispatch: OUT for unknown vehicle {}", vehicle);
            return Some(AppNotice::NotFound { vehicle });
        };
        let cmd = RobotCommand::Out(Assignment { slot, direction: Direction::Backward, vehicle: vehicle.clone() });
        if !self.registry.lock().await.send_to(Role::Robot, self.robot_handle, &cmd.to_string()) {
            warn!("dispatch: robot #{} not connected for OUT {}", self.robot_handle, vehicle);
            return Some(AppNotice::NoRobot { vehicle });
        }
        info!("dispatch: {} -> robot #{}", cmd, self.robot_handle);
        None
    }

    /// Applies a robot event to the lot and returns the notice for the apps.
    pub async fn handle_robot(&self, ev: RobotEvent) -> AppNotice {
        match ev {
            RobotEvent::SectorArrived { sector } => AppNotice::Move { code: location_code(sector, "Middle", 0) },
            RobotEvent::SubzoneArrived(slot) => AppNotice::Move { code: slot.location_code() },
            RobotEvent::StartingPoint => AppNotice::Move { code: location_code(0, "Middle", 0) },
            RobotEvent::Done(a) => AppNotice::Parked { code: a.slot.location_code(), vehicle: a.vehicle },
            RobotEvent::OutDone(a) => {
                let s = a.slot;
                match self.lot.lock().await.clear(s.sector, s.side.as_str(), s.subzone) {
                    Ok(Some(prev)) if prev != a.vehicle => warn!("dispatch: {} held {}, expected {}", s, prev, a.vehicle),
                    Ok(_) => {}
                    Err(e) => warn!("dispatch: OUT_DONE for bad bay: {}", e),
                }
                AppNotice::Lifted { code: s.location_code(), vehicle: a.vehicle }
            }
            RobotEvent::Complete => AppNotice::Complete,
            RobotEvent::Failed { assignment, reason } => {
                warn!("dispatch: mission for {} failed: {}", assignment.vehicle, reason);
                AppNotice::Failed { code: assignment.slot.location_code(), vehicle: assignment.vehicle }
            }
        }
    }
}

/// Accepts connections forever, one task per client.
pub async fn serve(listener: TcpListener, dispatcher: Arc<Dispatcher>) -> Result<()> {
    info!("dispatch: listening on {}", listener.local_addr()?);
    loop {
        let (sock, peer) = listener.accept().await.context("accept")?;
        let d = dispatcher.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_conn(sock, peer, d).await {
                warn!("dispatch: connection {} ended with error: {:#}", peer, e);
            }
        });
    }
}

async fn handle_conn(sock: TcpStream, peer: SocketAddr, d: Arc<Dispatcher>) -> Result<()> {
    let (rd, mut wr) = sock.into_split();
    let mut lines = BufReader::new(rd).lines();

    let Some(first) = lines.next_line().await? else { return Ok(()); };
    let role: Role = match first.trim().parse() {
        Ok(r) => r,
        Err(e) => {
            warn!("dispatch: {} rejected: {}", peer, e);
            let reply = AppNotice::Rejected { line: first.trim().to_string() };
            wr.write_all(format!("{}\n", reply).as_bytes()).await?;
            return Ok(());
        }
    };

    let (tx, mut rx) = mpsc::channel::<String>(OUTBOX_DEPTH);
    let id = d.registry.lock().await.register(role, tx.clone());
    info!("dispatch: {} #{} registered from {}", role, id, peer);

    let writer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if let Err(e) = wr.write_all(format!("{}\n", line).as_bytes()).await {
                debug!("dispatch: write to {} failed: {}", peer, e);
                break;
            }
        }
    });

    // A panic in the reader must not leave the client registered.
    let result = match tokio::spawn(read_loop(lines, role, id, tx, d.clone())).await {
        Ok(r) => r,
        Err(e) => {
            error!("dispatch: {} #{} reader died: {}", role, id, e);
            Err(anyhow::anyhow!("reader for {} #{} died: {}", role, id, e))
        }
    };

    d.registry.lock().await.deregister(role, id);
    info!("dispatch: {} #{} gone ({})", role, id, peer);
    if let Err(e) = writer.await {
        debug!("dispatch: writer for {} aborted: {}", peer, e);
    }
    result
}

async fn read_loop<R>(
    mut lines: tokio::io::Lines<R>,
    role: Role,
    id: u32,
    reply: mpsc::Sender<String>,
    d: Arc<Dispatcher>,
) -> Result<()>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() { continue; }
        debug!("dispatch: {} #{} <- {}", role, id, line);

        let answer = match role {
            Role::App => match AppRequest::parse(line) {
                Ok(req) => d.handle_app(req).await,
                Err(e) => {
                    info!("dispatch: app #{} sent {:?}: {}", id, line, e);
                    Some(AppNotice::UnknownCommand { line: line.to_string() })
                }
            },
            Role::Robot => match RobotEvent::parse(line) {
                Ok(ev) => {
                    let notice = d.handle_robot(ev).await;
                    let n = d.registry.lock().await.broadcast(Role::App, &notice.to_string());
                    if n == 0 {
                        info!("dispatch: no app connected for {}", notice);
                    }
                    None
                }
                Err(e) => {
                    info!("dispatch: robot #{} sent {:?}: {}", id, line, e);
                    Some(AppNotice::UnknownCommand { line: line.to_string() })
                }
            },
        };
        // waits for room; only this client stalls
        if let Some(notice) = answer {
            if reply.send(notice.to_string()).await.is_err() { break; }
        }
    }
    Ok(())
}
