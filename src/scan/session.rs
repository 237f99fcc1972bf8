//! Multi-step scan flows.
//!
//! A session walks through a fixed sequence of required inputs. Each state
//! carries exactly the values collected so far, so a session waiting for
//! goods always knows its operator and shipment. Invalid input leaves the
//! state untouched and records the error for the prompt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{ScanError, ScanResult};
use super::identity::{self, EmployeeId, GoodsScan};
use crate::models::check_line::{CountMode, LineKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanFlow {
    /// Finished-goods shipment check: operator, shipment, pallet, goods.
    FgCheck,
    /// Delivery handover: operator, receiving employee, LSX, goods.
    Delivery,
    /// Stock-take of a fixed area: operator, goods.
    StockCheck,
}

/// Everything a goods scan needs to address a check line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanTarget {
    pub operator: EmployeeId,
    pub receiver: Option<EmployeeId>,
    pub shipment: String,
    pub pallet: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    AwaitingOperator,
    AwaitingReceiver {
        operator: EmployeeId,
    },
    AwaitingShipment {
        operator: EmployeeId,
        receiver: Option<EmployeeId>,
    },
    AwaitingPallet {
        operator: EmployeeId,
        receiver: Option<EmployeeId>,
        shipment: String,
    },
    AwaitingLine(ScanTarget),
    Complete,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    AwaitingOperator,
    AwaitingReceiver,
    AwaitingShipment,
    AwaitingPallet,
    AwaitingLine,
    Complete,
    Cancelled,
}

impl SessionState {
    pub fn step(&self) -> Step {
        match self {
            SessionState::AwaitingOperator => Step::AwaitingOperator,
            SessionState::AwaitingReceiver { .. } => Step::AwaitingReceiver,
            SessionState::AwaitingShipment { .. } => Step::AwaitingShipment,
            SessionState::AwaitingPallet { .. } => Step::AwaitingPallet,
            SessionState::AwaitingLine(_) => Step::AwaitingLine,
            SessionState::Complete => Step::Complete,
            SessionState::Cancelled => Step::Cancelled,
        }
    }
}

/// Result of one accepted input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// A required field was stored and the session moved on.
    Advanced(Step),
    /// A goods label was parsed; the caller applies it to the check line and
    /// then calls [`ScanSession::record`].
    Goods { target: ScanTarget, goods: GoodsScan },
}

/// A scan that was applied to a check line during the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanOperation {
    pub line_key: LineKey,
    pub mode: CountMode,
    pub delta_quantity: i64,
    pub delta_cartons: i64,
    pub pallet: Option<String>,
    pub scanned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub flow: ScanFlow,
    pub mode: CountMode,
    pub operator: EmployeeId,
    pub receiver: Option<EmployeeId>,
    pub shipment: String,
    pub total_quantity: i64,
    pub total_cartons: i64,
    pub operations: Vec<ScanOperation>,
}

#[derive(Debug, Clone)]
pub struct ScanSession {
    id: Uuid,
    flow: ScanFlow,
    mode: CountMode,
    /// Fixed area for stock-check sessions.
    scope: Option<String>,
    state: SessionState,
    operations: Vec<ScanOperation>,
    last_error: Option<String>,
    opened_at: DateTime<Utc>,
}

impl ScanSession {
    pub fn open(flow: ScanFlow, mode: CountMode, scope: Option<&str>) -> ScanResult<Self> {
        let scope = match (flow, scope) {
            (ScanFlow::StockCheck, Some(raw)) => Some(identity::normalize_shipment_code(raw)?),
            (ScanFlow::StockCheck, None) => {
                return Err(ScanError::validation("Stock check requires an area scope"))
            }
            (_, _) => None,
        };

        Ok(Self {
            id: Uuid::new_v4(),
            flow,
            mode,
            scope,
            state: SessionState::AwaitingOperator,
            operations: Vec::new(),
            last_error: None,
            opened_at: Utc::now(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn flow(&self) -> ScanFlow {
        self.flow
    }

    pub fn mode(&self) -> CountMode {
        self.mode
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn step(&self) -> Step {
        self.state.step()
    }

    pub fn operations(&self) -> &[ScanOperation] {
        &self.operations
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn operator(&self) -> Option<&EmployeeId> {
        match &self.state {
            SessionState::AwaitingReceiver { operator }
            | SessionState::AwaitingShipment { operator, .. }
            | SessionState::AwaitingPallet { operator, .. } => Some(operator),
            SessionState::AwaitingLine(target) => Some(&target.operator),
            _ => None,
        }
    }

    pub fn target(&self) -> Option<&ScanTarget> {
        match &self.state {
            SessionState::AwaitingLine(target) => Some(target),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, SessionState::Complete | SessionState::Cancelled)
    }

    /// Feeds one raw scan into the current step.
    pub fn submit(&mut self, raw: &str) -> ScanResult<StepOutcome> {
        match self.advance(raw) {
            Ok(outcome) => {
                self.last_error = None;
                Ok(outcome)
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Records an error raised while applying a goods scan.
    pub fn reject(&mut self, err: &ScanError) {
        self.last_error = Some(err.to_string());
    }

    fn advance(&mut self, raw: &str) -> ScanResult<StepOutcome> {
        let next = match &self.state {
            SessionState::AwaitingOperator => {
                let operator = identity::normalize_employee_id(raw)?;
                match (self.flow, &self.scope) {
                    (ScanFlow::Delivery, _) => SessionState::AwaitingReceiver { operator },
                    (ScanFlow::FgCheck, _) => SessionState::AwaitingShipment {
                        operator,
                        receiver: None,
                    },
                    (ScanFlow::StockCheck, Some(scope)) => SessionState::AwaitingLine(ScanTarget {
                        operator,
                        receiver: None,
                        shipment: scope.clone(),
                        pallet: None,
                    }),
                    (ScanFlow::StockCheck, None) => {
                        return Err(ScanError::validation("Stock check requires an area scope"))
                    }
                }
            }
            SessionState::AwaitingReceiver { operator } => {
                let receiver = identity::normalize_employee_id(raw)?;
                SessionState::AwaitingShipment {
                    operator: operator.clone(),
                    receiver: Some(receiver),
                }
            }
            SessionState::AwaitingShipment { operator, receiver } => {
                let shipment = identity::normalize_shipment_code(raw)?;
                match self.flow {
                    ScanFlow::FgCheck => SessionState::AwaitingPallet {
                        operator: operator.clone(),
                        receiver: receiver.clone(),
                        shipment,
                    },
                    ScanFlow::Delivery | ScanFlow::StockCheck => SessionState::AwaitingLine(ScanTarget {
                        operator: operator.clone(),
                        receiver: receiver.clone(),
                        shipment,
                        pallet: None,
                    }),
                }
            }
            SessionState::AwaitingPallet {
                operator,
                receiver,
                shipment,
            } => {
                let pallet = identity::normalize_pallet(raw)?;
                SessionState::AwaitingLine(ScanTarget {
                    operator: operator.clone(),
                    receiver: receiver.clone(),
                    shipment: shipment.clone(),
                    pallet: Some(pallet),
                })
            }
            SessionState::AwaitingLine(target) => {
                let goods = identity::parse_goods_payload(raw, self.mode)?;
                return Ok(StepOutcome::Goods {
                    target: target.clone(),
                    goods,
                });
            }
            SessionState::Complete | SessionState::Cancelled => {
                return Err(ScanError::validation("Scan session is closed"));
            }
        };

        self.state = next;
        Ok(StepOutcome::Advanced(self.state.step()))
    }

    /// Appends an operation that was applied to the store.
    pub fn record(&mut self, op: ScanOperation) {
        self.operations.push(op);
    }

    /// Returns a finished-goods session to the pallet prompt.
    pub fn next_pallet(&mut self) -> ScanResult<()> {
        if self.flow != ScanFlow::FgCheck {
            return Err(ScanError::validation("Only finished-goods checks scan pallets"));
        }
        let SessionState::AwaitingLine(target) = &self.state else {
            return Err(ScanError::validation("Scan the current pallet before changing it"));
        };
        self.state = SessionState::AwaitingPallet {
            operator: target.operator.clone(),
            receiver: target.receiver.clone(),
            shipment: target.shipment.clone(),
        };
        self.last_error = None;
        Ok(())
    }

    /// Discards all session data. Lines already written are not touched.
    pub fn cancel(&mut self) {
        self.state = SessionState::Cancelled;
        self.operations.clear();
        self.last_error = None;
    }

    /// Closes the session and hands back the operations it applied.
    pub fn complete(&mut self) -> ScanResult<SessionReport> {
        let SessionState::AwaitingLine(target) = &self.state else {
            return Err(ScanError::validation(format!(
                "Cannot complete a session at step {:?}",
                self.state.step()
            )));
        };

        let operations = std::mem::take(&mut self.operations);
        let report = SessionReport {
            session_id: self.id,
            flow: self.flow,
            mode: self.mode,
            operator: target.operator.clone(),
            receiver: target.receiver.clone(),
            shipment: target.shipment.clone(),
            total_quantity: operations.iter().map(|o| o.delta_quantity).sum(),
            total_cartons: operations.iter().map(|o| o.delta_cartons).sum(),
            operations,
        };
        self.state = SessionState::Complete;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fg_session() -> ScanSession {
        ScanSession::open(ScanFlow::FgCheck, CountMode::Quantity, None).unwrap()
    }

    #[test]
    fn fg_check_walks_every_step() {
        let mut s = fg_session();
        assert_eq!(s.step(), Step::AwaitingOperator);
        assert_eq!(s.submit("asp0001").unwrap(), StepOutcome::Advanced(Step::AwaitingShipment));
        assert_eq!(s.submit("0001").unwrap(), StepOutcome::Advanced(Step::AwaitingPallet));
        assert_eq!(s.submit("p01").unwrap(), StepOutcome::Advanced(Step::AwaitingLine));

        let StepOutcome::Goods { target, goods } = s.submit("MAT01|PO1|10").unwrap() else {
            panic!("expected goods outcome");
        };
        assert_eq!(target.operator.as_str(), "ASP0001");
        assert_eq!(target.shipment, "0001");
        assert_eq!(target.pallet.as_deref(), Some("P01"));
        assert_eq!(goods.quantity, 10);
        assert_eq!(s.step(), Step::AwaitingLine);
    }

    #[test]
    fn invalid_input_keeps_state_and_reports_error() {
        let mut s = fg_session();
        s.submit("ASP0001").unwrap();
        assert!(s.submit("   ").is_err());
        assert_eq!(s.step(), Step::AwaitingShipment);
        assert!(s.last_error().is_some());
        assert_eq!(s.operator().map(|o| o.as_str()), Some("ASP0001"));

        s.submit("0001").unwrap();
        assert!(s.last_error().is_none());
        assert_eq!(s.step(), Step::AwaitingPallet);
    }

    #[test]
    fn bad_operator_never_advances() {
        let mut s = fg_session();
        assert!(s.submit("XYZ1234").is_err());
        assert!(s.submit("ASP123").is_err());
        assert_eq!(s.step(), Step::AwaitingOperator);
    }

    #[test]
    fn delivery_collects_receiver_before_lsx() {
        let mut s = ScanSession::open(ScanFlow::Delivery, CountMode::Carton, None).unwrap();
        s.submit("ASP0001").unwrap();
        assert_eq!(s.step(), Step::AwaitingReceiver);
        s.submit("ASP0002").unwrap();
        assert_eq!(s.step(), Step::AwaitingShipment);
        s.submit("LSX 2024-15").unwrap();
        let target = s.target().unwrap();
        assert_eq!(target.receiver.as_ref().map(|r| r.as_str()), Some("ASP0002"));
        assert_eq!(target.shipment, "2024/15");
        assert!(target.pallet.is_none());
    }

    #[test]
    fn stock_check_goes_straight_to_goods() {
        assert!(ScanSession::open(ScanFlow::StockCheck, CountMode::Quantity, None).is_err());
        let mut s = ScanSession::open(ScanFlow::StockCheck, CountMode::Quantity, Some("kho a")).unwrap();
        s.submit("ASP0003").unwrap();
        assert_eq!(s.step(), Step::AwaitingLine);
        assert_eq!(s.target().unwrap().shipment, "KHOA");
    }

    #[test]
    fn complete_only_from_goods_step() {
        let mut s = fg_session();
        s.submit("ASP0001").unwrap();
        assert!(s.complete().is_err());
        assert_eq!(s.step(), Step::AwaitingShipment);

        s.submit("0001").unwrap();
        s.submit("P01").unwrap();
        let report = s.complete().unwrap();
        assert_eq!(report.shipment, "0001");
        assert!(report.operations.is_empty());
        assert_eq!(s.step(), Step::Complete);
        assert!(s.submit("ASP0001").is_err());
    }

    #[test]
    fn cancel_from_any_state_discards_data() {
        let mut s = fg_session();
        s.submit("ASP0001").unwrap();
        s.cancel();
        assert_eq!(s.step(), Step::Cancelled);
        assert!(s.operator().is_none());
        assert!(s.is_closed());
        assert!(s.complete().is_err());
    }

    #[test]
    fn next_pallet_returns_to_pallet_prompt() {
        let mut s = fg_session();
        s.submit("ASP0001").unwrap();
        assert!(s.next_pallet().is_err());
        s.submit("0001").unwrap();
        s.submit("P01").unwrap();
        s.next_pallet().unwrap();
        assert_eq!(s.step(), Step::AwaitingPallet);
        s.submit("P02").unwrap();
        assert_eq!(s.target().unwrap().pallet.as_deref(), Some("P02"));
    }
}
