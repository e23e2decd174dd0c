//! Gates in front of the notification, event handler and obsess hooks

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{Engine, NotificationKind};
use crate::dependency::{DependencyKind, DependencyResolver};
use crate::models::{AcknowledgementType, HostId, ServiceId, StateType};

impl Engine {
    fn resolver(&self, now: DateTime<Utc>) -> DependencyResolver<'_> {
        DependencyResolver::new(
            &self.objects,
            &self.periods,
            self.config.soft_state_dependencies,
            now,
        )
    }

    fn service_notification_viable(&self, id: ServiceId, kind: NotificationKind) -> bool {
        let svc = self.objects.service(id);
        if !svc.notifications_enabled || svc.scheduled_downtime_depth > 0 {
            return false;
        }
        if kind != NotificationKind::Normal {
            return true;
        }
        if svc.flapping.is_flapping || svc.state_type != StateType::Hard {
            return false;
        }
        // Service problems behind a host outage belong to the host
        if !self.objects.host(svc.host).current_state.is_up() {
            return false;
        }
        if svc.current_state.is_ok() {
            // Recoveries only follow a problem that was notified
            return svc.notifications.current_number > 0;
        }
        svc.acknowledgement == AcknowledgementType::None && !svc.notifications.no_more_notifications
    }

    fn host_notification_viable(&self, id: HostId, kind: NotificationKind) -> bool {
        let host = self.objects.host(id);
        if !host.notifications_enabled || host.scheduled_downtime_depth > 0 {
            return false;
        }
        if kind != NotificationKind::Normal {
            return true;
        }
        if host.flapping.is_flapping || host.state_type != StateType::Hard {
            return false;
        }
        if host.current_state.is_up() {
            return host.notifications.current_number > 0;
        }
        host.acknowledgement == AcknowledgementType::None && !host.notifications.no_more_notifications
    }

    pub(crate) fn notify_service(&mut self, id: ServiceId, kind: NotificationKind, now: DateTime<Utc>) {
        if !self.service_notification_viable(id, kind) {
            debug!(
                "Notification for service '{}' is not viable",
                self.objects.service(id).display_name()
            );
            return;
        }
        let dependencies = self
            .resolver(now)
            .check_service(id, DependencyKind::Notification);
        self.hooks
            .service_notification(self.objects.service(id), kind, dependencies);

        if dependencies.is_ok() && kind == NotificationKind::Normal {
            let svc = self.objects.service_mut(id);
            svc.notifications.last_notification = Some(now);
            if !svc.current_state.is_ok() {
                svc.notifications.current_number += 1;
            }
        }
    }

    pub(crate) fn notify_host(&mut self, id: HostId, kind: NotificationKind, now: DateTime<Utc>) {
        if !self.host_notification_viable(id, kind) {
            debug!(
                "Notification for host '{}' is not viable",
                self.objects.host(id).name
            );
            return;
        }
        let dependencies = self.resolver(now).check_host(id, DependencyKind::Notification);
        self.hooks
            .host_notification(self.objects.host(id), kind, dependencies);

        if dependencies.is_ok() && kind == NotificationKind::Normal {
            let host = self.objects.host_mut(id);
            host.notifications.last_notification = Some(now);
            if !host.current_state.is_up() {
                host.notifications.current_number += 1;
            }
        }
    }

    pub(crate) fn run_service_event_handler(&mut self, id: ServiceId) {
        let svc = self.objects.service(id);
        if svc.event_handler_enabled {
            self.hooks.service_event_handler(svc);
        }
    }

    pub(crate) fn run_host_event_handler(&mut self, id: HostId) {
        let host = self.objects.host(id);
        if host.event_handler_enabled {
            self.hooks.host_event_handler(host);
        }
    }

    pub(crate) fn obsess_over_service(&mut self, id: ServiceId) {
        let svc = self.objects.service(id);
        if self.config.obsess_over_services && svc.obsess {
            self.hooks.obsess_over_service(svc);
        }
    }

    pub(crate) fn obsess_over_host(&mut self, id: HostId) {
        let host = self.objects.host(id);
        if self.config.obsess_over_hosts && host.obsess {
            self.hooks.obsess_over_host(host);
        }
    }

    pub(crate) fn service_status_changed(&mut self, id: ServiceId) {
        self.status_dirty = true;
        self.hooks.service_status_updated(self.objects.service(id));
    }

    pub(crate) fn host_status_changed(&mut self, id: HostId) {
        self.status_dirty = true;
        self.hooks.host_status_updated(self.objects.host(id));
    }

    pub(crate) fn log_service_event(&self, id: ServiceId) {
        let svc = self.objects.service(id);
        info!(
            "SERVICE ALERT: {};{};{};{};{}",
            svc.display_name(),
            svc.current_state,
            svc.state_type,
            svc.current_attempt,
            svc.plugin_output
        );
    }

    pub(crate) fn log_host_event(&self, id: HostId) {
        let host = self.objects.host(id);
        info!(
            "HOST ALERT: {};{};{};{};{}",
            host.name, host.current_state, host.state_type, host.current_attempt, host.plugin_output
        );
    }
}
