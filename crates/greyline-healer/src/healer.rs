//! The shipped [`Remediator`].

use std::sync::Arc;

use greyline_core::Node;
use greyline_core::config::{AlertingConfig, HealerConfig, MembershipConfig};

use crate::alert::{Alert, AlertSink, Alerter};
use crate::error::{MembershipError, NotificationError, ProvisioningError};
use crate::membership::MembershipBackend;
use crate::provision::{Provisioner, SequenceGenerator};
use crate::{PortFuture, Remediator};

#[derive(Clone)]
pub struct Healer {
    provisioner: Provisioner,
    membership: MembershipBackend,
    alerter: Alerter,
}

impl Healer {
    pub fn new(provisioner: Provisioner, membership: MembershipBackend, alerter: Alerter) -> Self {
        Self {
            provisioner,
            membership,
            alerter,
        }
    }

    /// Assemble a healer from config sections. `sequence` names new nodes.
    pub fn from_config(
        healer: &HealerConfig,
        alerting: &AlertingConfig,
        sequence: Arc<SequenceGenerator>,
        sink: Arc<dyn AlertSink>,
    ) -> Self {
        let provisioner = Provisioner::new(sequence, &healer.id_prefix, &healer.address_template)
            .with_delay(healer.provision_delay());

        let membership = match &healer.membership {
            MembershipConfig::Simulated => MembershipBackend::Simulated {
                delay: healer.membership_delay(),
            },
            MembershipConfig::Command { join, leave } => MembershipBackend::Command {
                join: join.clone(),
                leave: leave.clone(),
            },
        };

        Self::new(
            provisioner,
            membership,
            Alerter::new(alerting.enabled, sink),
        )
    }
}

impl Remediator for Healer {
    fn provision(&self) -> PortFuture<'_, Node, ProvisioningError> {
        Box::pin(self.provisioner.provision())
    }

    fn join<'a>(&'a self, address: &'a str) -> PortFuture<'a, (), MembershipError> {
        Box::pin(self.membership.join(address))
    }

    fn leave<'a>(&'a self, address: &'a str) -> PortFuture<'a, (), MembershipError> {
        Box::pin(self.membership.leave(address))
    }

    fn notify<'a>(&'a self, alert: &'a Alert) -> PortFuture<'a, (), NotificationError> {
        Box::pin(self.alerter.send(alert))
    }
}
