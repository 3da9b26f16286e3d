//! Location history map.
//!
//! Emits a self-contained Leaflet page: one circle marker per recorded
//! position, popup with the reading, view centered on the mean coordinate.
//! (The original used folium, which is the same thing generated from
//! Python.)

use crate::api::VehicleSnapshot;

const LEAFLET_CSS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css";
const LEAFLET_JS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js";

/// Render the location history as an HTML document. None when there is no
/// data to center the map on.
pub fn render_map(snapshots: &[VehicleSnapshot]) -> Option<String> {
    if snapshots.is_empty() {
        return None;
    }

    let count = snapshots.len() as f64;
    let center_lat: f64 = snapshots.iter().map(|s| s.latitude).sum::<f64>() / count;
    let center_lon: f64 = snapshots.iter().map(|s| s.longitude).sum::<f64>() / count;

    let mut markers = String::new();
    for s in snapshots {
        markers.push_str(&format!(
            "L.circleMarker([{lat:.6}, {lon:.6}], {{radius: 5, color: 'blue', \
             fillColor: 'blue', fillOpacity: 0.7}})\
             .bindPopup('{ts}<br>Charge: {charge:.1}%<br>Odometer: {odo:.1} miles')\
             .addTo(map);\n",
            lat = s.latitude,
            lon = s.longitude,
            ts = s.timestamp.format("%Y-%m-%d %H:%M"),
            charge = s.charge_percent,
            odo = s.odometer,
        ));
    }

    Some(format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Vehicle location history</title>
<link rel="stylesheet" href="{LEAFLET_CSS}">
<script src="{LEAFLET_JS}"></script>
<style>html, body, #map {{ height: 100%; margin: 0; }}</style>
</head>
<body>
<div id="map"></div>
<script>
var map = L.map('map').setView([{center_lat:.6}, {center_lon:.6}], 12);
L.tileLayer('https://tile.openstreetmap.org/{{z}}/{{x}}/{{y}}.png', {{
  attribution: '&copy; OpenStreetMap contributors'
}}).addTo(map);
{markers}</script>
</body>
</html>
"#
    ))
}
