//! Built-in intent catalog for Proxmox / homelab administration.
//!
//! Weights: the main verb of an intent is 1.0, synonyms 0.6–1.0, and kind
//! nouns ("vm", "container") 0.5, so a verb plus its noun saturates the
//! lexical score while a bare noun never does.

use pc_protocol::EntityKind::{
    ContainerId, Duration, FreeText, Hostname, Ip, Path, ResourceSpec, ServiceName, VmId,
};

use super::IntentTemplate;

const NOUN: f64 = 0.5;

fn vm(template: IntentTemplate) -> IntentTemplate {
    template
        .trigger("vm", NOUN)
        .trigger("virtual machine", NOUN)
}

fn container(template: IntentTemplate) -> IntentTemplate {
    template
        .trigger("container", NOUN)
        .trigger("ct", NOUN)
        .trigger("lxc", NOUN)
}

/// All built-in intents in registry order.
pub fn all_intents() -> Vec<IntentTemplate> {
    vec![
        // ── VM lifecycle ────────────────────────────────────────
        vm(IntentTemplate::new("vm_status", "show the status of a VM")
            .trigger("status", 1.0)
            .trigger("state", 0.8)
            .trigger("check", 0.6)
            .trigger("info", 0.6)
            .trigger("detail", 0.6)
            .trigger("health", 0.6)
            .requires(VmId)),
        vm(IntentTemplate::new("vm_start", "start a VM")
            .trigger("start", 1.0)
            .trigger("boot", 1.0)
            .trigger("power on", 1.0)
            .trigger("turn on", 1.0)
            .trigger("resume", 0.8)
            .requires(VmId)),
        vm(IntentTemplate::new("vm_stop", "stop a VM")
            .trigger("stop", 1.0)
            .trigger("shutdown", 1.0)
            .trigger("shut down", 1.0)
            .trigger("power off", 1.0)
            .trigger("turn off", 1.0)
            .trigger("halt", 0.8)
            .requires(VmId)),
        vm(IntentTemplate::new("vm_restart", "restart a VM")
            .trigger("restart", 1.0)
            .trigger("reset", 0.8)
            .trigger("bounce", 0.6)
            .requires(VmId)),
        vm(IntentTemplate::new("vm_create", "create a new VM")
            .trigger("create", 1.0)
            .trigger("provision", 1.0)
            .trigger("spin up", 1.0)
            .trigger("new", 0.6)
            .trigger("make", 0.6)
            .trigger("build", 0.6)
            .accepts(ResourceSpec)
            .accepts(FreeText)
            .accepts(VmId)
            .accepts(Ip)),
        vm(IntentTemplate::new("vm_delete", "delete a VM")
            .trigger("delete", 1.0)
            .trigger("remove", 1.0)
            .trigger("destroy", 1.0)
            .trigger("purge", 0.8)
            .requires(VmId)),
        vm(IntentTemplate::new("vm_resize", "change the resources of a VM")
            .trigger("resize", 1.0)
            .trigger("scale", 0.8)
            .trigger("increase", 0.8)
            .trigger("decrease", 0.8)
            .trigger("upgrade", 0.6)
            .trigger("memory", 0.7)
            .trigger("cpu", 0.7)
            .trigger("vcpu", 0.7)
            .trigger("core", 0.6)
            .trigger("disk", 0.5)
            .trigger("more", 0.4)
            .requires(VmId)
            .requires(ResourceSpec)),
        vm(IntentTemplate::new("vm_snapshot", "take a snapshot of a VM")
            .trigger("snapshot", 1.0)
            .trigger("checkpoint", 0.8)
            .requires(VmId)
            .accepts(FreeText)),
        vm(IntentTemplate::new("vm_set_ip", "set the IP address of a VM")
            .trigger("ip", 1.0)
            .trigger("address", 0.6)
            .trigger("assign", 0.6)
            .trigger("network", 0.4)
            .requires(VmId)
            .requires(Ip)),
        vm(IntentTemplate::new("vm_list", "list all VMs")
            .trigger("list", 1.0)
            .trigger("overview", 0.6)
            .trigger("show", 0.4)
            .trigger("inventory", 0.6)),
        // ── Containers ──────────────────────────────────────────
        container(IntentTemplate::new("container_create", "create a new container")
            .trigger("create", 1.0)
            .trigger("provision", 1.0)
            .trigger("spin up", 0.8)
            .trigger("new", 0.6)
            .trigger("make", 0.6)
            .accepts(ResourceSpec)
            .accepts(FreeText)
            .accepts(ContainerId)
            .accepts(Ip)),
        container(IntentTemplate::new("container_start", "start a container")
            .trigger("start", 1.0)
            .trigger("boot", 1.0)
            .trigger("power on", 1.0)
            .trigger("turn on", 1.0)
            .requires(ContainerId)),
        container(IntentTemplate::new("container_stop", "stop a container")
            .trigger("stop", 1.0)
            .trigger("shutdown", 1.0)
            .trigger("shut down", 1.0)
            .trigger("power off", 1.0)
            .trigger("turn off", 1.0)
            .requires(ContainerId)),
        container(IntentTemplate::new("container_mount", "mount a host path into a container")
            .trigger("mount", 1.0)
            .trigger("bind mount", 0.5)
            .trigger("attach", 0.7)
            .trigger("share", 0.5)
            .requires(ContainerId)
            .requires(Path)),
        // ── Services ────────────────────────────────────────────
        IntentTemplate::new("service_deploy", "deploy a service")
            .trigger("deploy", 1.0)
            .trigger("install", 1.0)
            .trigger("set up", 0.8)
            .trigger("setup", 0.8)
            .trigger("service", 0.5)
            .trigger("app", 0.5)
            .requires(ServiceName)
            .accepts(ContainerId)
            .accepts(VmId)
            .accepts(Hostname),
        // ── Backups ─────────────────────────────────────────────
        IntentTemplate::new("backup_create", "back up a guest now")
            .trigger("backup", 1.0)
            .trigger("back up", 1.0)
            .trigger("vzdump", 1.0)
            .trigger("dump", 0.6)
            .accepts(VmId)
            .accepts(ContainerId)
            .accepts(Path),
        IntentTemplate::new("backup_schedule", "schedule recurring backups")
            .trigger("schedule", 1.0)
            .trigger("cron", 0.8)
            .trigger("automate", 0.6)
            .trigger("recur", 0.6)
            .trigger("every", 0.6)
            .trigger("hourly", 0.6)
            .trigger("daily", 0.6)
            .trigger("nightly", 0.6)
            .trigger("weekly", 0.6)
            .trigger("monthly", 0.6)
            .trigger("night", 0.4)
            .trigger("backup", 0.5)
            .trigger("back up", 0.5)
            .requires(Duration)
            .accepts(VmId)
            .accepts(ContainerId)
            .accepts(Path),
        IntentTemplate::new("backup_restore", "restore a guest from backup")
            .trigger("restore", 1.0)
            .trigger("recover", 0.8)
            .trigger("rollback", 0.8)
            .trigger("roll back", 0.8)
            .trigger("backup", 0.4)
            .accepts(VmId)
            .accepts(ContainerId)
            .accepts(Path)
            .accepts(FreeText),
        // ── Networking ──────────────────────────────────────────
        IntentTemplate::new("domain_configure", "point a domain at a service")
            .trigger("domain", 1.0)
            .trigger("subdomain", 0.8)
            .trigger("dns", 0.8)
            .trigger("point", 0.8)
            .trigger("reverse proxy", 0.8)
            .trigger("proxy", 0.6)
            .trigger("ssl", 0.6)
            .trigger("certificate", 0.6)
            .trigger("configure", 0.3)
            .requires(Hostname)
            .accepts(ContainerId)
            .accepts(VmId)
            .accepts(Ip)
            .accepts(ServiceName),
        IntentTemplate::new("tunnel_create", "expose a service through a tunnel")
            .trigger("tunnel", 1.0)
            .trigger("cloudflare", 0.8)
            .trigger("cloudflared", 0.8)
            .trigger("expose", 0.8)
            .trigger("public", 0.5)
            .accepts(Hostname)
            .accepts(ServiceName)
            .accepts(ContainerId)
            .accepts(VmId),
    ]
}
