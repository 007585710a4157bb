//! Pre-built mock host scenarios for testing.
//!
//! These scenarios provide realistic `/proc`, `/sys` and macOS utility
//! output for testing probes and collectors.

use super::command::MockCommand;
use super::filesystem::MockFs;

const TYPICAL_STAT: &str = "\
cpu  10000 500 3000 80000 1000 200 100 0 0 0
cpu0 2500 125 750 20000 250 50 25 0 0 0
cpu1 2500 125 750 20000 250 50 25 0 0 0
cpu2 2500 125 750 20000 250 50 25 0 0 0
cpu3 2500 125 750 20000 250 50 25 0 0 0
intr 1000000 50 0 0 0 0 0 0 0 1 0 0 0 100 0 0 1000
ctxt 500000
btime 1700000000
processes 10000
procs_running 2
procs_blocked 0
";

const TYPICAL_INTERRUPTS: &str = "\
           CPU0       CPU1       CPU2       CPU3
  0:         20          0          0          0   IO-APIC    2-edge      timer
  8:          0          0          0          1   IO-APIC    8-edge      rtc0
LOC:     250000     250000     250000     249979   Local timer interrupts
ERR:          0
";

impl MockFs {
    /// A 4-thread, 2-core Linux host with cpufreq and two thermal zones.
    ///
    /// Includes three processes (PIDs 1, 1000, 1001).
    pub fn typical_linux() -> Self {
        let mut fs = Self::new();

        fs.add_file("/proc/stat", TYPICAL_STAT);
        fs.add_file("/proc/uptime", "12345.67 98765.43\n");
        fs.add_file("/proc/loadavg", "0.15 0.10 0.05 1/150 1234\n");
        fs.add_file("/proc/interrupts", TYPICAL_INTERRUPTS);

        let mut cpuinfo = String::new();
        for (cpu, mhz) in [1800, 2000, 2200, 2400].into_iter().enumerate() {
            cpuinfo.push_str(&format!(
                "processor\t: {cpu}\n\
                 vendor_id\t: GenuineIntel\n\
                 model name\t: Intel(R) Core(TM) i5-7200U CPU @ 2.50GHz\n\
                 cpu MHz\t\t: {mhz}.000\n\
                 physical id\t: 0\n\
                 core id\t\t: {}\n\
                 cpu cores\t: 2\n\n",
                cpu / 2
            ));
        }
        fs.add_file("/proc/cpuinfo", cpuinfo);

        for (cpu, khz) in [2_000_000, 2_200_000, 2_400_000, 2_600_000]
            .into_iter()
            .enumerate()
        {
            fs.add_cpufreq(cpu as u32, khz, 800_000, 3_600_000);
        }

        fs.add_thermal_zone(0, 45000);
        fs.add_thermal_zone(1, 52000);

        for pid in [1, 1000, 1001] {
            fs.add_pid(pid);
        }

        fs
    }

    /// An 8-CPU Linux VM with no cpufreq, no thermal zones and no core
    /// topology in cpuinfo.
    pub fn eight_core_linux() -> Self {
        let mut fs = Self::new();

        let mut stat = String::from("cpu  40000 0 8000 320000 0 0 0 0 0 0\n");
        for cpu in 0..8 {
            stat.push_str(&format!("cpu{cpu} 5000 0 1000 40000 0 0 0 0 0 0\n"));
        }
        stat.push_str("intr 2000000 0\nctxt 800000\nprocesses 500\n");
        fs.add_file("/proc/stat", stat);

        fs.add_file("/proc/uptime", "600.00 4800.00\n");
        fs.add_file("/proc/loadavg", "4.00 2.00 1.00 3/300 4242\n");

        let mut cpuinfo = String::new();
        for cpu in 0..8 {
            cpuinfo.push_str(&format!(
                "processor\t: {cpu}\nmodel name\t: QEMU Virtual CPU\ncpu MHz\t\t: 3000.000\n\n"
            ));
        }
        fs.add_file("/proc/cpuinfo", cpuinfo);

        for pid in 1..=12 {
            fs.add_pid(pid);
        }

        fs
    }
}

impl MockCommand {
    /// An 8-thread, 4-core Mac where `sudo -n powermetrics` is permitted.
    pub fn typical_macos() -> Self {
        Self::new()
            .with_output("sysctl -n hw.logicalcpu", "8")
            .with_output("sysctl -n hw.ncpu", "8")
            .with_output("sysctl -n hw.physicalcpu", "4")
            .with_output("sysctl -n vm.loadavg", "{ 1.50 1.25 1.00 }")
            .with_output("sysctl -n hw.cpufrequency", "2400000000")
            .with_output("sysctl -n hw.cpufrequency_min", "1200000000")
            .with_output("sysctl -n hw.cpufrequency_max", "3200000000")
            .with_output(
                "sysctl -n kern.boottime",
                "{ sec = 1700000000, usec = 123456 } Tue Nov 14 22:13:20 2023",
            )
            .with_output("ps -A -o %cpu", " %CPU\n 120.0\n  50,0\n  30.0\n")
            .with_output("ps -A -o pid=", "    1\n   88\n  301\n  302\n  999\n")
            .with_output(
                "sudo -n powermetrics --samplers smc -i 1 -n 1",
                "*** Sampled system activity ***\n\n\
                 **** SMC sensors ****\n\n\
                 CPU die temperature: 45.50 C\n\
                 GPU die temperature: 40.10 C\n",
            )
    }
}
