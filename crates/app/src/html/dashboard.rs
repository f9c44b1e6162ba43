pub(crate) const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Traffic Monitor</title>
  <style>
    body { margin: 0; background: #0f172a; color: #e2e8f0; font-family: system-ui, sans-serif; }
    main { display: flex; flex-wrap: wrap; gap: 24px; padding: 24px; align-items: flex-start; }
    .feed { border: 2px solid #334155; border-radius: 8px; max-width: 100%; }
    .panel { background: #1e293b; border-radius: 8px; padding: 20px 28px; min-width: 220px; }
    .light { display: flex; flex-direction: column; gap: 12px; background: #020617;
             padding: 14px; border-radius: 12px; width: 64px; margin: 16px auto; }
    .lamp { width: 64px; height: 64px; border-radius: 50%; background: #1f2937; opacity: 0.35; }
    .lamp.on { opacity: 1; box-shadow: 0 0 24px currentColor; }
    .lamp.red { color: #ef4444; } .lamp.red.on { background: #ef4444; }
    .lamp.yellow { color: #facc15; } .lamp.yellow.on { background: #facc15; }
    .lamp.green { color: #22c55e; } .lamp.green.on { background: #22c55e; }
    .count { font-size: 2.5rem; font-weight: 700; text-align: center; }
    .muted { color: #94a3b8; text-align: center; }
  </style>
</head>
<body>
  <main>
    <img class="feed" src="/video_feed" alt="Live camera feed" />
    <section class="panel">
      <h2>Signal</h2>
      <div class="light">
        <div id="lamp-red" class="lamp red"></div>
        <div id="lamp-yellow" class="lamp yellow"></div>
        <div id="lamp-green" class="lamp green"></div>
      </div>
      <div class="count" id="count">0</div>
      <div class="muted">vehicles in view</div>
      <div class="muted" id="state">waiting for status</div>
    </section>
  </main>
  <script>
    const colors = ["red", "yellow", "green"];
    async function refresh() {
      try {
        const resp = await fetch("/traffic_status", { cache: "no-store" });
        const status = await resp.json();
        for (const c of colors) {
          document.getElementById("lamp-" + c).classList.toggle("on", c === status.traffic_light);
        }
        document.getElementById("count").textContent = status.vehicle_count;
        document.getElementById("state").textContent = "signal: " + status.traffic_light;
      } catch (err) {
        document.getElementById("state").textContent = "status unavailable";
      }
    }
    refresh();
    setInterval(refresh, 1000);
  </script>
</body>
</html>
"#;
